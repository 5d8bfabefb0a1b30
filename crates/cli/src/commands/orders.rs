//! Order history commands.

use tokio_util::sync::CancellationToken;

use craftmart_core::OrderId;
use craftmart_storefront::state::AppState;

use super::{CliError, emit};
use crate::{OrdersAction, views};

pub async fn run(state: &AppState, action: OrdersAction) -> Result<(), CliError> {
    match action {
        OrdersAction::List => {
            let orders = state.orders().order_history().await?;
            emit(&views::order_list(&orders));
        }
        OrdersAction::Show { order_id } => {
            let cancel = cancel_on_ctrl_c();
            let details = state
                .orders()
                .order_details(&OrderId::new(order_id), cancel)
                .await?;
            emit(&views::order_details(&details));
        }
    }
    Ok(())
}

/// Token cancelled when the shopper presses Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    token
}
