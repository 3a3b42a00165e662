use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use quickdraw_collab::StateMap;
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, ToSchema, Validate, Deserialize)]
pub struct CreateRoomSchema {
    #[validate(length(min = 4, max = 16))]
    pub passcode: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
pub struct JoinRoomSchema {
    #[validate(length(min = 4, max = 16))]
    pub passcode: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
pub struct SetStateSchema {
    #[schema(value_type = Object)]
    pub state: StateMap,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
pub struct ChangeTurnSchema {
    #[validate(length(min = 1))]
    pub turn_player_id: String,
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_passcode_length_is_bounded() {
        let passcode = |p: &str| CreateRoomSchema {
            passcode: p.to_string(),
        };

        assert!(passcode("123").validate().is_err());
        assert!(passcode("1234").validate().is_ok());
        assert!(passcode("1234567890123456").validate().is_ok());
        assert!(passcode("12345678901234567").validate().is_err());
    }

    #[test]
    fn test_state_must_be_an_object() {
        let null = serde_json::from_value::<SetStateSchema>(json!({ "state": null }));
        let list = serde_json::from_value::<SetStateSchema>(json!({ "state": [1] }));
        let missing = serde_json::from_value::<SetStateSchema>(json!({}));
        let object = serde_json::from_value::<SetStateSchema>(json!({ "state": { "a": 1 } }));

        assert!(null.is_err());
        assert!(list.is_err());
        assert!(missing.is_err());
        assert!(object.is_ok());
    }
}
