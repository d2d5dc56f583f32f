use serde::{Deserialize, Serialize};

/// Body sent to the signing endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest<'a> {
    /// Storage path to sign.
    pub file_path: &'a str,
    /// Requested lifetime in seconds.
    pub expires_in: i64,
}

/// Successful signing response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignResponse {
    /// Signed URL; absent or empty means the request failed.
    #[serde(default, alias = "signedURL")]
    pub signed_url: Option<String>,
}

/// Error body returned by the signing endpoint.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    /// Error message.
    #[serde(alias = "error")]
    pub message: String,
}
