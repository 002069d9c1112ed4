//! HTTP client for the AlaskaPay backend
//!
//! Edge functions are called with `POST {base}/functions/v1/{name}` and table
//! rows are read or inserted through the REST endpoint under `/rest/v1`.
//! Side-effecting calls carry the authorization's idempotency key both in
//! the body and in an `Idempotency-Key` header.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::auth::SecurePin;
use crate::backend::PaymentBackend;
use crate::config::BackendConfig;
use crate::error::Error;
use crate::limits::KycLimitContext;
use crate::money::Amount;
use crate::types::{
    Ack, BillPaymentRequest, BillPaymentResponse, InitiateTransferRequest,
    InitiateTransferResponse, OtpResponse, SubmitOtpRequest, VerifyPinRequest, VerifyPinResponse,
    VerifyTransferRequest, VerifyTransferResponse, WalletRow, WalletTransferRequest,
    WithdrawalRecord, WithdrawalRequest,
};

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// AlaskaPay backend client
#[derive(Debug, Clone)]
pub struct AlaskaPayClient {
    http: Client,
    config: BackendConfig,
    /// Signed-in user's access token; the API key is used when absent
    session_token: Option<String>,
}

impl AlaskaPayClient {
    /// Create a new client with the given configuration
    pub fn new(config: BackendConfig) -> Result<Self, Error> {
        if config.api_key.is_empty() {
            warn!("backend.api_key is empty; requests will likely be rejected");
        }
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http,
            config,
            session_token: None,
        })
    }

    /// Authenticate requests as a signed-in user
    pub fn with_session(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .session_token
            .as_deref()
            .unwrap_or(self.config.api_key.as_str());
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(bearer)
    }

    /// Call an edge function with a JSON body
    pub async fn invoke<Req, Res>(
        &self,
        function: &str,
        body: &Req,
        idempotency_key: Option<Uuid>,
    ) -> Result<Res, Error>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        debug!(function, "invoking edge function");
        let mut request = self
            .authorize(self.http.post(self.url(&format!("functions/v1/{}", function))))
            .json(body);
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_HEADER, key.to_string());
        }
        decode(request.send().await?).await
    }

    /// Read rows where `column` equals `value`
    pub async fn select<Res: DeserializeOwned>(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<Vec<Res>, Error> {
        debug!(table, column, "selecting rows");
        let request = self
            .authorize(self.http.get(self.url(&format!("rest/v1/{}", table))))
            .query(&[(column, format!("eq.{}", value)), ("select", "*".to_string())]);
        decode(request.send().await?).await
    }

    /// Insert one row and return it as stored
    pub async fn insert<Req, Res>(
        &self,
        table: &str,
        row: &Req,
        idempotency_key: Option<Uuid>,
    ) -> Result<Res, Error>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        debug!(table, "inserting row");
        let mut request = self
            .authorize(self.http.post(self.url(&format!("rest/v1/{}", table))))
            .header("Prefer", "return=representation")
            .json(row);
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_HEADER, key.to_string());
        }
        let rows: Vec<Res> = decode(request.send().await?).await?;
        rows.into_iter().next().ok_or_else(|| Error::Backend {
            status: 500,
            message: format!("Insert into {} returned no row", table),
        })
    }
}

/// Turn a response into `T`, or into [`Error::Backend`] for non-2xx statuses
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, Error> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });
        warn!(status = status.as_u16(), message = %message, "backend returned an error");
        return Err(Error::Backend {
            status: status.as_u16(),
            message,
        });
    }

    Ok(serde_json::from_str(&body)?)
}

/// Pull a human-readable message out of an error body
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error", "msg"]
        .iter()
        .find_map(|field| value.get(*field)?.as_str().map(str::to_string))
}

#[async_trait]
impl PaymentBackend for AlaskaPayClient {
    #[instrument(skip(self, pin))]
    async fn verify_pin(&self, user_id: &str, pin: &SecurePin) -> Result<bool, Error> {
        let response: VerifyPinResponse = self
            .invoke("verify-pin", &VerifyPinRequest { user_id, pin }, None)
            .await?;
        Ok(response.valid)
    }

    #[instrument(skip(self))]
    async fn fetch_balance(&self, wallet_id: &str) -> Result<Amount, Error> {
        let rows: Vec<WalletRow> = self.select("wallets", "id", wallet_id).await?;
        rows.into_iter()
            .next()
            .map(|row| row.balance)
            .ok_or_else(|| Error::Backend {
                status: 404,
                message: "Wallet not found".to_string(),
            })
    }

    #[instrument(skip(self))]
    async fn fetch_kyc_limits(&self, user_id: &str) -> Result<KycLimitContext, Error> {
        self.invoke("kyc-limits", &serde_json::json!({ "user_id": user_id }), None)
            .await
    }

    #[instrument(skip_all, fields(key = %request.idempotency_key))]
    async fn process_bill_payment(
        &self,
        request: &BillPaymentRequest,
    ) -> Result<BillPaymentResponse, Error> {
        self.invoke("process-bill-payment", request, Some(request.idempotency_key))
            .await
    }

    #[instrument(skip_all, fields(key = %request.idempotency_key))]
    async fn wallet_transfer(&self, request: &WalletTransferRequest) -> Result<Ack, Error> {
        self.invoke("wallet-transfer", request, Some(request.idempotency_key))
            .await
    }

    #[instrument(skip_all, fields(key = %request.idempotency_key))]
    async fn create_withdrawal_request(
        &self,
        request: &WithdrawalRequest,
    ) -> Result<WithdrawalRecord, Error> {
        self.insert("withdrawal_requests", request, Some(request.idempotency_key))
            .await
    }

    #[instrument(skip_all, fields(key = %request.idempotency_key))]
    async fn initiate_transfer(
        &self,
        request: &InitiateTransferRequest,
    ) -> Result<InitiateTransferResponse, Error> {
        self.invoke("initiate-transfer", request, Some(request.idempotency_key))
            .await
    }

    #[instrument(skip(self, otp))]
    async fn submit_otp(&self, reference: &str, otp: &str) -> Result<OtpResponse, Error> {
        self.invoke("submit-otp", &SubmitOtpRequest { reference, otp }, None)
            .await
    }

    #[instrument(skip(self))]
    async fn verify_transfer(&self, reference: &str) -> Result<VerifyTransferResponse, Error> {
        self.invoke("verify-transfer", &VerifyTransferRequest { reference }, None)
            .await
    }
}
