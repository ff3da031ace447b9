//! HTTP ticketing API client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::ShowApiConfig;

use super::{
    BuyerPayload, ConfirmBuyer, OrderPayload, OrderRequest, ProjectInfo, PurchaseTokens,
    SaleFlag, ShowApi, ShowApiError, SkuEntry, SubmitOutcome, TokenRequest,
};

const FRONT_VERSION: &str = "134";
const REQUEST_SOURCE: &str = "pc-new";

/// Response envelope shared by all ticketing endpoints.
///
/// Errors are reported either through `errno`/`msg` or `code`/`message`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    errno: i64,
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn code(&self) -> i64 {
        if self.errno != 0 {
            self.errno
        } else {
            self.code
        }
    }

    fn message(&self) -> String {
        if self.errno != 0 || self.message.is_empty() {
            self.msg.clone()
        } else {
            self.message.clone()
        }
    }

    /// Data of a successful response.
    fn into_data(self) -> Result<T, ShowApiError> {
        let code = self.code();
        if code != 0 {
            return Err(ShowApiError::Api {
                code,
                message: self.message(),
            });
        }
        self.data
            .ok_or_else(|| ShowApiError::Decode("missing data field".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ProjectPayload {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    sale_begin: i64,
    #[serde(default)]
    sale_end: i64,
    #[serde(default, rename = "hotProject")]
    hot_project: bool,
    #[serde(default)]
    id_bind: i64,
    #[serde(default)]
    screen_list: Vec<ScreenPayload>,
}

#[derive(Debug, Deserialize)]
struct ScreenPayload {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    ticket_list: Vec<SkuPayload>,
}

#[derive(Debug, Deserialize)]
struct SkuPayload {
    id: i64,
    #[serde(default)]
    price: i64,
    #[serde(default)]
    desc: String,
    #[serde(default, rename = "saleStart")]
    sale_start: i64,
    #[serde(default, rename = "saleEnd")]
    sale_end: i64,
    #[serde(default)]
    sale_flag: Option<SaleFlagPayload>,
    #[serde(default)]
    screen_name: String,
}

#[derive(Debug, Deserialize)]
struct SaleFlagPayload {
    #[serde(default)]
    number: i64,
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct PreparePayload {
    #[serde(default)]
    token: String,
    #[serde(default)]
    ptoken: String,
    #[serde(default)]
    ga_data: Option<GaData>,
}

#[derive(Debug, Deserialize)]
struct GaData {
    #[serde(default)]
    grisk_id: String,
}

#[derive(Debug, Deserialize)]
struct ConfirmPayload {
    #[serde(default, rename = "buyerList")]
    buyer_list: Option<BuyerList>,
}

#[derive(Debug, Deserialize)]
struct BuyerList {
    #[serde(default)]
    list: Vec<serde_json::Value>,
}

fn unix_secs(secs: i64) -> Option<DateTime<Utc>> {
    if secs <= 0 {
        return None;
    }
    Utc.timestamp_opt(secs, 0).single()
}

fn project_info(payload: &ProjectPayload) -> ProjectInfo {
    ProjectInfo {
        project_id: payload.id,
        name: payload.name.clone(),
        is_guarded: payload.hot_project,
        needs_contact_buyer: payload.id_bind == 0,
        sale_start: unix_secs(payload.sale_begin),
        sale_end: unix_secs(payload.sale_end),
    }
}

fn sku_list(payload: ProjectPayload) -> Vec<SkuEntry> {
    payload
        .screen_list
        .into_iter()
        .flat_map(|screen| {
            let screen_id = screen.id;
            let screen_name = screen.name;
            screen.ticket_list.into_iter().map(move |sku| {
                let sale_flag = sku
                    .sale_flag
                    .map(|f| SaleFlag {
                        number: f.number,
                        display_name: f.display_name,
                    })
                    .unwrap_or(SaleFlag {
                        number: 0,
                        display_name: String::new(),
                    });
                SkuEntry {
                    screen_id,
                    sku_id: sku.id,
                    name: if sku.screen_name.is_empty() {
                        screen_name.clone()
                    } else {
                        sku.screen_name
                    },
                    desc: sku.desc,
                    price: sku.price,
                    sale_flag,
                    sale_start: unix_secs(sku.sale_start),
                    sale_end: unix_secs(sku.sale_end),
                }
            })
        })
        .collect()
}

fn confirm_buyer(value: serde_json::Value) -> Option<ConfirmBuyer> {
    let buyer_id = value.get("id")?.as_i64()?;
    let text = |key: &str| {
        value
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };
    Some(ConfirmBuyer {
        buyer_id,
        name: text("name"),
        tel: text("tel"),
        personal_id: text("personal_id"),
        raw: value,
    })
}

fn map_transport(e: reqwest::Error) -> ShowApiError {
    if e.is_timeout() {
        ShowApiError::Timeout
    } else {
        ShowApiError::Transport(e.to_string())
    }
}

/// Ticketing API client over HTTP.
pub struct HttpShowClient {
    client: Client,
    base_url: String,
}

impl HttpShowClient {
    pub fn new(config: &ShowApiConfig) -> Result<Self, ShowApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| ShowApiError::Transport(format!("invalid user agent: {}", e)))?,
        );
        if let Some(cookie) = &config.cookie {
            let mut value = HeaderValue::from_str(cookie)
                .map_err(|_| ShowApiError::Transport("invalid cookie header".to_string()))?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .cookie_store(true)
            .build()
            .map_err(|e| ShowApiError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<Envelope<T>, ShowApiError> {
        let status = response.status();
        let body = response.text().await.map_err(map_transport)?;
        serde_json::from_str(&body).map_err(|e| {
            ShowApiError::Decode(format!(
                "HTTP {}: {} ({})",
                status,
                e,
                body.chars().take(100).collect::<String>()
            ))
        })
    }

    async fn fetch_project(&self, project_id: i64) -> Result<ProjectPayload, ShowApiError> {
        let url = format!(
            "{}/api/ticket/project/getV2?version={}&id={}&project_id={}&requestSource={}",
            self.base_url, FRONT_VERSION, project_id, project_id, REQUEST_SOURCE
        );
        let response = self.client.get(&url).send().await.map_err(map_transport)?;
        Self::decode::<ProjectPayload>(response).await?.into_data()
    }
}

#[async_trait]
impl ShowApi for HttpShowClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_project_info(&self, project_id: i64) -> Result<ProjectInfo, ShowApiError> {
        let payload = self.fetch_project(project_id).await?;
        Ok(project_info(&payload))
    }

    async fn fetch_sku_list(&self, project_id: i64) -> Result<Vec<SkuEntry>, ShowApiError> {
        let payload = self.fetch_project(project_id).await?;
        Ok(sku_list(payload))
    }

    async fn acquire_purchase_token(
        &self,
        request: &TokenRequest,
    ) -> Result<PurchaseTokens, ShowApiError> {
        let url = format!(
            "{}/api/ticket/order/prepare?project_id={}",
            self.base_url, request.project_id
        );
        let mut body = serde_json::json!({
            "project_id": request.project_id,
            "screen_id": request.screen_id,
            "order_type": 1,
            "count": 1,
            "sku_id": request.sku_id,
            "requestSource": REQUEST_SOURCE,
        });
        if request.guarded {
            body["newRisk"] = serde_json::Value::Bool(true);
            body["token"] = serde_json::Value::String(request.prepare_token.clone());
        }

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;
        let data = Self::decode::<PreparePayload>(response).await?.into_data()?;

        debug!(project_id = request.project_id, "Purchase tokens acquired");

        Ok(PurchaseTokens {
            request_token: data.token,
            p_token: data.ptoken,
            gaia_token: data
                .ga_data
                .map(|g| g.grisk_id)
                .filter(|id| !id.is_empty()),
        })
    }

    async fn fetch_confirm_buyers(
        &self,
        tokens: &PurchaseTokens,
        project_id: i64,
    ) -> Result<Vec<ConfirmBuyer>, ShowApiError> {
        let url = format!("{}/api/ticket/order/confirmInfo", self.base_url);
        let project = project_id.to_string();
        let query = [
            ("token", tokens.request_token.as_str()),
            ("ptoken", tokens.p_token.as_str()),
            ("project_id", project.as_str()),
            ("projectId", project.as_str()),
            ("requestSource", REQUEST_SOURCE),
            ("voucher", ""),
        ];

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(map_transport)?;
        let data = Self::decode::<ConfirmPayload>(response).await?.into_data()?;

        Ok(data
            .buyer_list
            .map(|l| l.list)
            .unwrap_or_default()
            .into_iter()
            .filter_map(confirm_buyer)
            .collect())
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<SubmitOutcome, ShowApiError> {
        let url = format!(
            "{}/api/ticket/order/createV2?project_id={}",
            self.base_url, request.project_id
        );

        let buyer_info = match &request.buyer {
            BuyerPayload::Contact { name, tel } => {
                serde_json::json!([{ "name": name, "tel": tel }])
            }
            BuyerPayload::RealName(buyer) => serde_json::json!([buyer.raw]),
        };

        let mut form: Vec<(&str, String)> = vec![
            ("project_id", request.project_id.to_string()),
            ("screen_id", request.screen_id.to_string()),
            ("count", "1".to_string()),
            ("pay_money", request.price.to_string()),
            ("order_type", "1".to_string()),
            ("timestamp", request.anchor.timestamp().to_string()),
            ("buyer_info", buyer_info.to_string()),
            ("sku_id", request.sku_id.to_string()),
            ("requestSource", REQUEST_SOURCE.to_string()),
        ];
        if request.guarded {
            form.push(("newRisk", "true".to_string()));
            form.push(("ctoken", request.create_token.clone()));
            form.push(("ptoken", request.tokens.p_token.clone()));
            form.push(("token", request.tokens.request_token.clone()));
        }

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(map_transport)?;
        let envelope = Self::decode::<OrderPayload>(response).await?;

        Ok(SubmitOutcome {
            code: envelope.code(),
            message: envelope.message(),
            order: envelope.data,
        })
    }
}
