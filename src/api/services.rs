use serde::Serialize;

use super::types::{Apod, ApodData, ApodInfo};
use super::{ApiClient, ApiResult, RequestError};

#[derive(Serialize)]
struct DateReq<'a> {
    date: &'a str,
}

#[derive(Serialize)]
struct SetGoodReq<'a> {
    good: bool,
    date: &'a str,
}

impl ApiClient {
    pub async fn apods(&self) -> ApiResult<Vec<ApodInfo>> {
        self.get("/services/apod/list").await
    }

    /// Metadata for the media of `date` (RFC 3339). `Ok(None)` when the
    /// backend reports there is none for that day.
    pub async fn apod_info(&self, date: &str) -> ApiResult<Option<ApodData>> {
        match self
            .post("/services/apod/get_image_info", &DateReq { date })
            .await
        {
            Ok(data) => Ok(Some(data)),
            Err(RequestError::Gone) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn apod_image(&self, date: &str) -> ApiResult<Apod> {
        self.post("/services/apod/get_image", &DateReq { date })
            .await
    }

    pub async fn set_apod_good(&self, good: bool, date: &str) -> ApiResult<()> {
        self.post_empty("/services/apod/set_good", &SetGoodReq { good, date })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_request_shape() {
        let json = serde_json::to_string(&DateReq {
            date: "2026-10-18T00:00:00Z",
        })
        .unwrap();
        assert_eq!(json, r#"{"date":"2026-10-18T00:00:00Z"}"#);
    }

    #[test]
    fn set_good_request_shape() {
        let json = serde_json::to_string(&SetGoodReq {
            good: true,
            date: "2026-10-18T00:00:00Z",
        })
        .unwrap();
        assert_eq!(json, r#"{"good":true,"date":"2026-10-18T00:00:00Z"}"#);
    }
}
