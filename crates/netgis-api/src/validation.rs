// Geometry validation endpoint
//
// Unlike the other endpoints, rejection is an expected answer here: the
// validator uses 4xx statuses with an `error_type` body to say *why* a
// geometry is illegal. Those are decoded into `ValidationResponse`
// variants; anything else stays an `Error`.

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::client::{GisClient, decode, error_message};
use crate::error::Error;
use crate::models::{
    ValidateGeometryRequest, ValidationErrorBody, ValidationResponse, ValidationSuccess,
};

impl GisClient {
    /// Ask the service whether a geometry is legal for its layer.
    ///
    /// `POST /api/gis-layer/validate-geometry/`
    pub async fn validate_geometry(
        &self,
        request: &ValidateGeometryRequest,
    ) -> Result<ValidationResponse, Error> {
        let url = self.api_url("gis-layer/validate-geometry/")?;
        debug!(layer = %request.layer_key, element = ?request.element_id, "validating geometry");
        let (status, body) = self.post_raw(url, request).await?;
        interpret(status, &body)
    }
}

fn interpret(status: StatusCode, body: &str) -> Result<ValidationResponse, Error> {
    if status.is_success() {
        let success: ValidationSuccess = decode(body)?;
        return Ok(ValidationResponse::Success(success));
    }

    if matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY
    ) {
        if let Ok(rejection) = serde_json::from_str::<ValidationErrorBody>(body) {
            match rejection.error_type.as_str() {
                "intersects" => {
                    return Ok(ValidationResponse::Intersects(
                        rejection.data.unwrap_or_default(),
                    ));
                }
                "contains" => {
                    return Ok(ValidationResponse::Contains(
                        rejection
                            .message
                            .unwrap_or_else(|| "geometry is outside its boundary".into()),
                    ));
                }
                other => warn!(error_type = other, "unknown validation error type"),
            }
        }
    }

    Err(Error::Api {
        status: status.as_u16(),
        message: error_message(body),
    })
}
