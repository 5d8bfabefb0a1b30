//! Order history and order detail reads.

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use craftmart_core::OrderId;

use crate::api::conversions::{convert_order_details, convert_order_summary};
use crate::api::endpoints;
use crate::api::types::{OrderDetailsDto, OrderSummaryDto};
use crate::api::{ApiClient, ApiError};
use crate::error::{AppError, Result};
use crate::models::{OrderDetails, OrderSummary};

/// Read-only access to the signed-in customer's orders.
#[derive(Debug, Clone)]
pub struct Orders {
    api: ApiClient,
}

impl Orders {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Orders placed by the signed-in customer, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::AuthRequired` when signed out.
    #[instrument(skip(self))]
    pub async fn order_history(&self) -> Result<Vec<OrderSummary>> {
        let customer = self
            .api
            .session()
            .customer_id()
            .ok_or(ApiError::AuthRequired)?;
        let dtos: Vec<OrderSummaryDto> = self
            .api
            .get_optional(&endpoints::order_history(customer))
            .await?
            .unwrap_or_default();

        let mut orders: Vec<OrderSummary> = dtos.into_iter().map(convert_order_summary).collect();
        orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        Ok(orders)
    }

    /// Full detail for one order.
    ///
    /// The fetch is abandoned as soon as `cancel` fires, e.g. when the shopper
    /// leaves the detail view before it loads.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Cancelled` if cancelled, `AppError::NotFound` if the
    /// backend has no such order.
    #[instrument(skip(self, cancel), fields(order_id = %order_id))]
    pub async fn order_details(
        &self,
        order_id: &OrderId,
        cancel: CancellationToken,
    ) -> Result<OrderDetails> {
        let path = endpoints::order_details(order_id);
        let fetched = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("Order detail fetch cancelled");
                return Err(AppError::Cancelled);
            }
            result = self.api.get_optional::<OrderDetailsDto>(&path) => result,
        };

        match fetched {
            Ok(Some(dto)) => Ok(convert_order_details(dto)),
            Ok(None) | Err(ApiError::Api { status: 404, .. }) => {
                Err(AppError::NotFound(format!("Order {order_id}")))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::StorefrontConfig;
    use crate::events::EventBus;
    use crate::session::Session;

    fn orders() -> Orders {
        let config = StorefrontConfig::for_api_base("http://127.0.0.1:9").unwrap();
        Orders::new(ApiClient::new(&config, Session::in_memory(), EventBus::default()))
    }

    #[tokio::test]
    async fn test_history_requires_sign_in() {
        let err = orders().order_history().await.unwrap_err();
        assert!(err.is_auth_required());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = orders()
            .order_details(&OrderId::new("SO-1"), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
    }
}
