//! Wizard definition endpoints.

use axum::{extract::Path, Json};

use crate::rest::dto::WizardResponse;
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::parse_kind;
use crate::wizards::{describe, WizardKind};

/// List the available wizards and their steps
#[utoipa::path(
    get,
    path = "/api/v1/wizards",
    tag = "Wizards",
    responses(
        (status = 200, description = "All wizard definitions", body = Vec<WizardResponse>)
    )
)]
pub async fn list() -> Result<Json<Vec<WizardResponse>>, ApiError> {
    let wizards = WizardKind::all()
        .iter()
        .map(|kind| describe(*kind).map(WizardResponse::from))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(wizards))
}

/// Get one wizard definition
#[utoipa::path(
    get,
    path = "/api/v1/wizards/{kind}",
    tag = "Wizards",
    params(
        ("kind" = String, Path, description = "Wizard kind (onboarding, cpq, payslip)")
    ),
    responses(
        (status = 200, description = "Wizard definition", body = WizardResponse),
        (status = 404, description = "Unknown wizard", body = ErrorResponse)
    )
)]
pub async fn get_one(Path(kind): Path<String>) -> Result<Json<WizardResponse>, ApiError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(describe(kind)?.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_returns_every_wizard() {
        let Json(wizards) = list().await.unwrap();
        let kinds: Vec<_> = wizards.iter().map(|w| w.kind.as_str()).collect();
        assert_eq!(kinds, vec!["onboarding", "cpq", "payslip"]);
    }

    #[tokio::test]
    async fn test_get_unknown_wizard() {
        let result = get_one(Path("invoice".to_string())).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }
}
