//! Backend endpoint paths, relative to the API base.
//!
//! Paths never start with `/` so they join under any path prefix on the base.

use craftmart_core::{CartId, CartItemId, CountryId, CustomerId, OrderId, ProductId, StateId};

// Auth
pub const LOGIN: &str = "customer/login";
pub const REGISTER: &str = "customer";
pub const REFRESH_TOKEN: &str = "customer/refresh_token";
pub const FORGOT_PASSWORD: &str = "customer/forgot_password";

#[must_use]
pub fn reset_password(code: &str) -> String {
    format!("customer/reset_password/{}", urlencoding::encode(code))
}

#[must_use]
pub fn update_password(customer: CustomerId) -> String {
    format!("customer/{customer}/update_password")
}

// Cart
pub const CART: &str = "cart";

#[must_use]
pub fn cart_item(cart: CartId, item: CartItemId) -> String {
    format!("cart/{cart}/item/{item}")
}

#[must_use]
pub fn move_to_cart(cart: CartId) -> String {
    format!("cart/{cart}/move_to_cart")
}

#[must_use]
pub fn saved_products(customer: CustomerId) -> String {
    format!("customer/{customer}/saved_product")
}

// Addresses and geo
#[must_use]
pub fn addresses(customer: CustomerId) -> String {
    format!("customer/{customer}/address")
}

pub const COUNTRIES: &str = "master/countries";

#[must_use]
pub fn states(country: CountryId) -> String {
    format!("master/states?country_id={country}")
}

#[must_use]
pub fn cities(state: StateId) -> String {
    format!("master/cities?state_id={state}")
}

// Checkout
#[must_use]
pub fn serviceability(pincode: &str) -> String {
    format!(
        "logistic_partner/get_pincode_serviceability/{}",
        urlencoding::encode(pincode)
    )
}

#[must_use]
pub fn delivery_charge(pincode: &str) -> String {
    format!(
        "logistic_partner/get_delivery_charge/{}",
        urlencoding::encode(pincode)
    )
}

pub const CREATE_ORDER: &str = "sell_order/create";

// Orders
#[must_use]
pub fn order_details(order: &OrderId) -> String {
    format!(
        "sell_order/order_details?order_id={}",
        urlencoding::encode(order.as_str())
    )
}

#[must_use]
pub fn order_history(customer: CustomerId) -> String {
    format!("customer/{customer}/sell_order")
}

// Catalog
pub const PRODUCTS: &str = "product/sell";
pub const CATEGORIES: &str = "master_category";

#[must_use]
pub fn product(id: ProductId) -> String {
    format!("product/sell/{id}")
}

// Contact
pub const CONTACT: &str = "reach_us";
pub const CONTACT_TYPES: &str = "reach_us/types";
