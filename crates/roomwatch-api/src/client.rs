//! HTTP client for the live platform API.

use roomwatch_controller::{LiveStatus, RoomDiscovery, ServiceError, TokenSource};
use roomwatch_protocol::{Area, RoomId};
use tracing::debug;

use crate::response::{self, AreaRoom, DanmuInfo, RoomStatus};
use crate::{ApiConfig, ApiError};

const DANMU_INFO: &str = "getDanmuInfo";
const ROOM_INFO: &str = "Room/get_info";
const AREA_ROOMS: &str = "area/getRoomList";

/// Client for the handful of live API endpoints the controllers need.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct BilibiliClient {
    client: reqwest::Client,
    config: ApiConfig,
}

impl BilibiliClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let config = config.validated();
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Fetches the feed token for `room_id`.
    pub async fn danmu_token(&self, room_id: RoomId) -> Result<String, ApiError> {
        let info: DanmuInfo = self
            .get(
                DANMU_INFO,
                "/xlive/web-room/v1/index/getDanmuInfo",
                &[("id", room_id.to_string()), ("type", "0".into())],
            )
            .await?;
        Ok(info.token)
    }

    /// Whether `room_id` is broadcasting. Replay loops count as offline.
    pub async fn room_is_live(&self, room_id: RoomId) -> Result<bool, ApiError> {
        let status: RoomStatus = self
            .get(
                ROOM_INFO,
                "/room/v1/Room/get_info",
                &[("room_id", room_id.to_string())],
            )
            .await?;
        Ok(status.is_live())
    }

    /// Up to `count` rooms of `area`, most watched first.
    ///
    /// Pages through the listing until `count` rooms are collected or a
    /// page comes back short.
    pub async fn area_rooms(&self, area: Area, count: usize) -> Result<Vec<RoomId>, ApiError> {
        let page_size = self.config.page_size;
        let mut rooms = Vec::with_capacity(count);
        let mut page = 1;

        while rooms.len() < count {
            let batch: Vec<AreaRoom> = self
                .get(
                    AREA_ROOMS,
                    "/room/v1/area/getRoomList",
                    &[
                        ("parent_area_id", area.id().to_string()),
                        ("cate_id", "0".into()),
                        ("area_id", "0".into()),
                        ("sort_type", "online".into()),
                        ("platform", "web".into()),
                        ("page", page.to_string()),
                        ("page_size", page_size.to_string()),
                    ],
                )
                .await?;

            let short = batch.len() < page_size;
            rooms.extend(batch.into_iter().map(|room| room.roomid));
            if short {
                break;
            }
            page += 1;
        }

        rooms.truncate(count);
        debug!(%area, count, found = rooms.len(), "area rooms listed");
        Ok(rooms)
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.config.base_url, path);
        let body = self
            .client
            .get(&url)
            .header(reqwest::header::REFERER, self.config.referer.as_str())
            .query(query)
            .send()
            .await
            .map_err(|source| ApiError::Request { endpoint, source })?
            .text()
            .await
            .map_err(|source| ApiError::Request { endpoint, source })?;
        response::parse(endpoint, &body)
    }
}

impl TokenSource for BilibiliClient {
    async fn live_danmu_token(&self, room_id: RoomId) -> Result<String, ServiceError> {
        Ok(self.danmu_token(room_id).await?)
    }
}

impl LiveStatus for BilibiliClient {
    async fn is_live(&self, room_id: RoomId) -> Result<bool, ServiceError> {
        Ok(self.room_is_live(room_id).await?)
    }
}

impl RoomDiscovery for BilibiliClient {
    async fn raffle_rooms_in_area(
        &self,
        area: Area,
        count: usize,
    ) -> Result<Vec<RoomId>, ServiceError> {
        Ok(self.area_rooms(area, count).await?)
    }
}
