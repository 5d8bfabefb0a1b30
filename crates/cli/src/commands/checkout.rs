//! Checkout command.

use craftmart_storefront::state::AppState;

use super::{CliError, emit};
use crate::views;

/// Show the order summary per address and, with `place`, submit the order.
pub async fn run(state: &AppState, address: Option<&str>, place: bool) -> Result<(), CliError> {
    let cart = state.cart().fetch_cart().await?;
    let addresses = state.addresses().list().await?;
    let checkout = state.checkout();

    checkout.prefetch().await;
    if let Some(id) = address
        && !checkout.select_address(id)
    {
        return Err(CliError::Invalid(format!("No saved address with id {id}")));
    }
    checkout.refresh_selection();
    let selected = checkout.selected_address();

    for a in &addresses {
        let is_selected = selected.as_ref().is_some_and(|s| s.local_id == a.local_id);
        let service = checkout.serviceability(&a.pincode);
        emit(&views::address_card(a, is_selected, service.as_ref()));
        emit(&views::checkout_summary(&checkout.totals(&cart, Some(&a.pincode))));
        emit("");
    }

    if !place {
        match &selected {
            Some(a) => emit(&format!("Deliver to [{}]. Run with --place to order.", a.local_id)),
            None => emit("Choose an address to deliver to."),
        }
        return Ok(());
    }

    let outcome = checkout.place_order(&cart).await?;
    emit(&outcome.route.describe());
    if outcome.is_success() {
        Ok(())
    } else {
        Err(CliError::Invalid("The order was not placed.".to_string()))
    }
}
