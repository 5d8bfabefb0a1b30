//! Cart and saved-for-later commands.

use craftmart_storefront::state::AppState;

use super::{CliError, confirm, emit};
use crate::{CartAction, views};

pub async fn run(state: &AppState, action: CartAction) -> Result<(), CliError> {
    let cart = state.cart();
    match action {
        CartAction::Show => {
            cart.refresh_all().await?;
            show(state);
        }
        CartAction::Add { product, qty } => {
            let updated = cart.add_to_cart(product, qty).await?;
            emit(&format!("Added. {} item(s) in your cart.", updated.item_count()));
        }
        CartAction::Qty { item, quantity } => {
            cart.fetch_cart().await?;
            let applied = cart.change_quantity(item, quantity).await?;
            #[allow(clippy::float_cmp)]
            if f64::from(applied) != quantity.floor() {
                emit(&format!("Quantity set to {applied} (limited by stock)."));
            }
            show(state);
        }
        CartAction::Remove { item, yes } => {
            cart.fetch_cart().await?;
            let pending = cart.request_removal(item)?;
            if !yes && !confirm(&format!("Remove \"{}\" from your cart?", pending.title()))? {
                emit("Kept in cart.");
                return Ok(());
            }
            cart.confirm_removal(pending).await?;
            show(state);
        }
        CartAction::Save { item } => {
            cart.fetch_cart().await?;
            cart.save_for_later(item).await?;
            show(state);
        }
        CartAction::Saved => {
            let saved = cart.fetch_saved_items().await?;
            emit(&views::saved_items(&saved));
        }
        CartAction::Move { saved } => {
            cart.refresh_all().await?;
            cart.move_to_cart(saved).await?;
            show(state);
        }
        CartAction::Unsave { saved } => {
            cart.fetch_saved_items().await?;
            cart.delete_saved(saved).await?;
            emit(&views::saved_items(&cart.saved_items()));
        }
    }
    Ok(())
}

fn show(state: &AppState) {
    let cart = state.cart().local();
    let totals = state.checkout().totals(&cart, None);
    emit(&views::cart(&cart, &state.cart().saved_items(), &totals));
}
