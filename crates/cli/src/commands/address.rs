//! Address book commands.

use clap::Args;

use craftmart_storefront::address::AddressDraft;
use craftmart_storefront::state::AppState;

use super::{CliError, emit, find_by_name_or_id};
use crate::{AddressAction, views};

/// Fields of the add-address form.
#[derive(Args)]
pub struct AddArgs {
    /// Recipient name
    #[arg(long)]
    name: String,

    /// 10-digit phone, optionally prefixed with +91
    #[arg(long)]
    contact: String,

    #[arg(long)]
    line1: String,

    #[arg(long, default_value = "")]
    line2: String,

    #[arg(long, default_value = "")]
    line3: String,

    #[arg(long, default_value = "")]
    landmark: String,

    /// Country name or id
    #[arg(long, default_value = "India")]
    country: String,

    /// State name or id
    #[arg(long)]
    state: String,

    /// City name or id
    #[arg(long)]
    city: String,

    #[arg(long)]
    pincode: String,

    /// Make this the default address
    #[arg(long)]
    default: bool,
}

pub async fn run(state: &AppState, action: AddressAction) -> Result<(), CliError> {
    match action {
        AddressAction::List => list(state).await,
        AddressAction::Add(args) => add(state, args).await,
    }
}

/// Print address cards with serviceability, checking every pincode first.
pub async fn list(state: &AppState) -> Result<(), CliError> {
    let addresses = state.addresses().list().await?;
    if addresses.is_empty() {
        emit("No saved addresses. Add one with `craftmart address add`.");
        return Ok(());
    }

    let checkout = state.checkout();
    checkout.prefetch().await;
    checkout.refresh_selection();
    let selected = checkout.selected_address().map(|a| a.local_id);

    let cards: Vec<String> = addresses
        .iter()
        .map(|a| {
            let service = checkout.serviceability(&a.pincode);
            views::address_card(
                a,
                selected.as_deref() == Some(a.local_id.as_str()),
                service.as_ref(),
            )
        })
        .collect();
    emit(&cards.join("\n\n"));
    Ok(())
}

async fn add(state: &AppState, args: AddArgs) -> Result<(), CliError> {
    let book = state.addresses();
    book.open_add();

    let countries = book.countries().await?;
    let country = find_by_name_or_id(&countries, &args.country, |c| c.id.as_i64(), |c| &c.name)
        .cloned()
        .ok_or_else(|| CliError::Invalid(format!("Unknown country: {}", args.country)))?;

    let states = book.select_country(country).await?;
    let region = find_by_name_or_id(&states, &args.state, |s| s.id.as_i64(), |s| &s.name)
        .cloned()
        .ok_or_else(|| CliError::Invalid(format!("Unknown state: {}", args.state)))?;

    let cities = book.select_state(region).await?;
    let city = find_by_name_or_id(&cities, &args.city, |c| c.id.as_i64(), |c| &c.name)
        .cloned()
        .ok_or_else(|| CliError::Invalid(format!("Unknown city: {}", args.city)))?;
    book.select_city(city);

    let draft = AddressDraft {
        recipient_name: args.name,
        contact: args.contact,
        line1: args.line1,
        line2: args.line2,
        line3: args.line3,
        landmark: args.landmark,
        pincode: args.pincode,
        is_default: args.default,
        ..book.draft()
    };
    let saved = book.save(&draft).await?;
    emit(&format!("Address saved. You have {} address(es).", saved.len()));
    Ok(())
}
