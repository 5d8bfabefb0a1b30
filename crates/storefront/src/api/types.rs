//! Wire types for the backend REST API.
//!
//! These mirror the JSON the backend sends and receives. The backend mixes
//! `snake_case` and `camelCase` field names between endpoints, so response
//! types accept both through aliases; request types are sent as the backend
//! documents them. Conversion into domain models lives in `conversions`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use craftmart_core::{
    Ack, AddressId, CartId, CartItemId, CategoryId, CityId, ContactTypeId, CountryId, CustomerId,
    OrderId, OrderStatus, ProductId, SavedItemId, StateId,
};

use super::ApiError;

// =============================================================================
// Envelope
// =============================================================================

/// Standard response wrapper: `{ ack, data, error: { code, message } }`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub ack: Option<Ack>,
    pub data: Option<T>,
    pub error: Option<ErrorBody>,
}

impl<T> Envelope<T> {
    /// An explicit `ack` decides; without one, the presence of `error` does.
    #[must_use]
    pub fn is_success(&self) -> bool {
        match &self.ack {
            Some(Ack::Success) => true,
            Some(Ack::Failure) => false,
            Some(Ack::Other(_)) | None => self.error.is_none(),
        }
    }

    /// Payload of a successful envelope.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` for a failure envelope and
    /// `ApiError::EmptyBody` when a success carries no data.
    pub fn into_data(self) -> Result<T, ApiError> {
        self.into_optional()?.ok_or(ApiError::EmptyBody)
    }

    /// Payload of a successful envelope, which may legitimately be absent.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` for a failure envelope.
    pub fn into_optional(self) -> Result<Option<T>, ApiError> {
        if self.is_success() {
            return Ok(self.data);
        }
        let error = self.error.unwrap_or_default();
        Err(ApiError::Rejected {
            code: error.code,
            message: error.message.unwrap_or_default(),
        })
    }
}

/// Error object carried by failure responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default, deserialize_with = "lenient::code")]
    pub code: Option<i64>,
    #[serde(default, alias = "msg")]
    pub message: Option<String>,
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Tokens and customer id returned by login and refresh.
#[derive(Debug, Deserialize)]
pub struct TokenData {
    #[serde(alias = "accessToken", alias = "token")]
    pub access_token: String,
    #[serde(default, alias = "refreshToken")]
    pub refresh_token: Option<String>,
    #[serde(default, alias = "customerId")]
    pub customer_id: Option<CustomerId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
    pub password: &'a str,
    pub captcha_token: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ForgotPasswordRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ResetPasswordRequest<'a> {
    pub new_password: &'a str,
    pub confirm_password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct UpdatePasswordRequest<'a> {
    pub current_password: &'a str,
    pub new_password: &'a str,
    pub confirm_password: &'a str,
}

// =============================================================================
// Catalog
// =============================================================================

/// Product image: either a bare URL or an object carrying one.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ImageDto {
    Url(String),
    Object {
        #[serde(alias = "image_url", alias = "imageUrl", alias = "src")]
        url: String,
    },
}

impl ImageDto {
    pub fn into_url(self) -> String {
        match self {
            Self::Url(url) | Self::Object { url } => url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryDto {
    #[serde(alias = "category_id", alias = "categoryId")]
    pub id: CategoryId,
    #[serde(alias = "title", alias = "category_name")]
    pub name: String,
    #[serde(default, alias = "parentId")]
    pub parent_id: Option<CategoryId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductDto {
    #[serde(alias = "product_id", alias = "productId")]
    pub id: ProductId,
    #[serde(alias = "name", alias = "product_name")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "actualPrice", alias = "mrp")]
    pub actual_price: Option<Decimal>,
    #[serde(default, alias = "discountedPrice", alias = "selling_price")]
    pub discounted_price: Option<Decimal>,
    #[serde(default, alias = "product_images")]
    pub images: Vec<ImageDto>,
    #[serde(default, alias = "quantity_available", alias = "stock_quantity")]
    pub stock: Option<i64>,
    #[serde(default)]
    pub category: Option<CategoryDto>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<String>,
}

/// Paged product listing. Some deployments return a bare array instead.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ProductListDto {
    Paged {
        #[serde(alias = "products", alias = "rows")]
        items: Vec<ProductDto>,
    },
    Bare(Vec<ProductDto>),
}

impl ProductListDto {
    pub fn into_items(self) -> Vec<ProductDto> {
        match self {
            Self::Paged { items } | Self::Bare(items) => items,
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CartDto {
    #[serde(default, alias = "cart_id", alias = "cartId")]
    pub id: Option<CartId>,
    #[serde(default, alias = "customerId")]
    pub customer_id: Option<CustomerId>,
    #[serde(default, alias = "cart_items", alias = "cartItems")]
    pub items: Vec<CartItemDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CartItemDto {
    #[serde(alias = "item_id", alias = "itemId", alias = "cart_item_id")]
    pub id: CartItemId,
    #[serde(default, alias = "productId")]
    pub product_id: Option<ProductId>,
    #[serde(default, deserialize_with = "lenient::quantity")]
    pub quantity: f64,
    #[serde(default, alias = "inUse", deserialize_with = "lenient::flag")]
    pub in_use: Option<bool>,
    #[serde(default)]
    pub product: Option<ProductDto>,
}

#[derive(Debug, Serialize)]
pub struct AddToCartRequest {
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct MoveToCartRequest {
    pub saved_product_id: SavedItemId,
    pub product_id: ProductId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SavedProductDto {
    #[serde(alias = "saved_product_id", alias = "savedProductId")]
    pub id: SavedItemId,
    #[serde(default, alias = "productId")]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub product: Option<ProductDto>,
}

#[derive(Debug, Serialize)]
pub struct SaveProductRequest {
    pub product_id: ProductId,
    /// Cart line the product is moved out of, if any.
    pub cart_item_id: Option<CartItemId>,
}

#[derive(Debug, Serialize)]
pub struct DeleteSavedRequest {
    pub saved_product_id: SavedItemId,
}

// =============================================================================
// Addresses and geo master data
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct GeoDto<Id> {
    pub id: Id,
    #[serde(alias = "title")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressDto {
    #[serde(alias = "address_id", alias = "addressId")]
    pub id: AddressId,
    #[serde(alias = "recipientName", alias = "name")]
    pub recipient_name: String,
    #[serde(alias = "contact_number", alias = "phone")]
    pub contact: String,
    #[serde(alias = "address_line1", alias = "addressLine1")]
    pub line1: String,
    #[serde(default, alias = "address_line2", alias = "addressLine2")]
    pub line2: Option<String>,
    #[serde(default, alias = "address_line3", alias = "addressLine3")]
    pub line3: Option<String>,
    #[serde(default)]
    pub landmark: Option<String>,
    #[serde(alias = "countryId")]
    pub country_id: CountryId,
    #[serde(default, alias = "countryName")]
    pub country_name: Option<String>,
    #[serde(alias = "stateId")]
    pub state_id: StateId,
    #[serde(default, alias = "stateName")]
    pub state_name: Option<String>,
    #[serde(alias = "cityId")]
    pub city_id: CityId,
    #[serde(default, alias = "cityName")]
    pub city_name: Option<String>,
    #[serde(alias = "pin_code", alias = "pinCode", deserialize_with = "lenient::text")]
    pub pincode: String,
    #[serde(default, alias = "isDefault", deserialize_with = "lenient::flag")]
    pub is_default: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct AddressRequest<'a> {
    pub recipient_name: &'a str,
    pub contact: &'a str,
    pub address_line1: &'a str,
    pub address_line2: Option<&'a str>,
    pub address_line3: Option<&'a str>,
    pub landmark: Option<&'a str>,
    pub country_id: CountryId,
    pub state_id: StateId,
    pub city_id: CityId,
    pub pincode: &'a str,
    pub is_default: bool,
}

// =============================================================================
// Checkout
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ServiceabilityDto {
    #[serde(default, alias = "is_prepaid", alias = "prepaid_available", deserialize_with = "lenient::flag")]
    pub prepaid: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DeliveryChargeDto {
    Object {
        #[serde(alias = "deliveryCharge", alias = "charge", alias = "amount")]
        delivery_charge: Decimal,
    },
    Bare(Decimal),
}

impl DeliveryChargeDto {
    pub fn amount(&self) -> Decimal {
        match self {
            Self::Object { delivery_charge } | Self::Bare(delivery_charge) => *delivery_charge,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest<A> {
    pub customer_id: CustomerId,
    pub delivery_address_id: A,
    pub billing_address_id: A,
}

/// Order creation replies are inspected directly, not through `Envelope`:
/// an order id at the top level or inside `data` counts as success even
/// without an `ack`.
#[derive(Debug, Default, Deserialize)]
pub struct CreateOrderResponse {
    #[serde(default)]
    pub ack: Option<Ack>,
    #[serde(default, alias = "orderId")]
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub data: Option<CreateOrderData>,
    #[serde(default)]
    pub error: Option<ErrorBody>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateOrderData {
    #[serde(default, alias = "orderId", alias = "id")]
    pub order_id: Option<OrderId>,
}

impl CreateOrderResponse {
    /// Order id wherever the backend put it.
    pub fn order_id(&self) -> Option<&OrderId> {
        self.order_id
            .as_ref()
            .or_else(|| self.data.as_ref().and_then(|d| d.order_id.as_ref()))
    }

    /// `ack` is case-insensitively `success`, or an order id is present.
    pub fn is_success(&self) -> bool {
        self.ack.as_ref().is_some_and(Ack::is_success) || self.order_id().is_some()
    }

    /// Failure reason for the failure page.
    pub fn failure_reason(&self) -> String {
        self.error
            .as_ref()
            .and_then(|e| e.message.clone())
            .or_else(|| self.message.clone())
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "Order could not be placed".to_string())
    }
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct OrderSummaryDto {
    #[serde(alias = "orderId", alias = "id")]
    pub order_id: OrderId,
    #[serde(default, alias = "createdAt", alias = "placed_at")]
    pub created_at: Option<String>,
    #[serde(default, alias = "orderStatus", alias = "order_status")]
    pub status: Option<OrderStatus>,
    #[serde(default, alias = "totalAmount", alias = "total_amount")]
    pub total: Option<Decimal>,
    #[serde(default, alias = "itemCount", alias = "items_count")]
    pub item_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemDto {
    #[serde(default, alias = "productId")]
    pub product_id: Option<ProductId>,
    #[serde(default, alias = "product_name", alias = "name")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::quantity")]
    pub quantity: f64,
    #[serde(default, alias = "unitPrice", alias = "price")]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub image: Option<ImageDto>,
    #[serde(default)]
    pub product: Option<ProductDto>,
}

#[derive(Debug, Deserialize)]
pub struct OrderDetailsDto {
    #[serde(alias = "orderId", alias = "id")]
    pub order_id: OrderId,
    #[serde(default, alias = "createdAt", alias = "placed_at")]
    pub created_at: Option<String>,
    #[serde(default, alias = "orderStatus", alias = "order_status")]
    pub status: Option<OrderStatus>,
    #[serde(default, alias = "order_items", alias = "orderItems")]
    pub items: Vec<OrderItemDto>,
    #[serde(default, alias = "deliveryCharge")]
    pub delivery_charge: Option<Decimal>,
    #[serde(default, alias = "totalAmount", alias = "total_amount")]
    pub total: Option<Decimal>,
    #[serde(default, alias = "shippingAddress", alias = "delivery_address")]
    pub shipping_address: Option<String>,
    #[serde(default, alias = "trackingUrl")]
    pub tracking_url: Option<String>,
}

// =============================================================================
// Contact
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ContactTypeDto {
    pub id: ContactTypeId,
    #[serde(alias = "title", alias = "type")]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ContactRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub reach_us_type_id: ContactTypeId,
    pub message: &'a str,
    pub captcha_token: &'a str,
}

// =============================================================================
// Lenient field decoders
// =============================================================================

mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Error codes arrive as numbers or numeric strings.
    pub fn code<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        })
    }

    /// Booleans arrive as `true`, `1`, `"true"` or `"1"`.
    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Bool(b)) => Some(b),
            Some(Value::Number(n)) => n.as_i64().map(|n| n != 0),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }

    /// Codes such as pincodes arrive as numbers or strings.
    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => String::new(),
        })
    }

    /// Quantities arrive as numbers or numeric strings; anything else is 0.
    pub fn quantity<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_envelope_becomes_rejected() {
        let envelope: Envelope<serde_json::Value> = serde_json::from_value(json!({
            "ack": "FAILURE",
            "error": { "code": "1003", "message": "Product already saved" }
        }))
        .unwrap();
        let err = envelope.into_data().unwrap_err();
        assert_eq!(err.code(), Some(1003));
        assert_eq!(err.server_message(), Some("Product already saved"));
    }

    #[test]
    fn test_success_without_data_is_empty_body() {
        let envelope: Envelope<CartDto> =
            serde_json::from_value(json!({ "ack": "success" })).unwrap();
        assert!(matches!(envelope.into_data(), Err(ApiError::EmptyBody)));
    }

    #[test]
    fn test_cart_accepts_camel_case_and_string_numbers() {
        let cart: CartDto = serde_json::from_value(json!({
            "cartId": "12",
            "cartItems": [{
                "itemId": 3,
                "productId": "40",
                "quantity": "2",
                "inUse": 1,
                "product": {
                    "productId": 40,
                    "name": "Jute tote",
                    "actualPrice": "450.00",
                    "images": [{ "imageUrl": "https://cdn.example.in/tote.jpg" }],
                    "stock": 5
                }
            }]
        }))
        .unwrap();
        assert_eq!(cart.id, Some(CartId::new(12)));
        let item = cart.items.first().unwrap();
        assert!((item.quantity - 2.0).abs() < f64::EPSILON);
        assert_eq!(item.in_use, Some(true));
        let product = item.product.as_ref().unwrap();
        assert_eq!(product.actual_price, Some(Decimal::from(450)));
    }

    #[test]
    fn test_order_response_success_rules() {
        let by_ack: CreateOrderResponse =
            serde_json::from_value(json!({ "ack": "Success" })).unwrap();
        assert!(by_ack.is_success());
        assert!(by_ack.order_id().is_none());

        let by_id: CreateOrderResponse =
            serde_json::from_value(json!({ "data": { "orderId": 881 } })).unwrap();
        assert!(by_id.is_success());
        assert_eq!(by_id.order_id().map(OrderId::as_str), Some("881"));

        let failed: CreateOrderResponse = serde_json::from_value(json!({
            "ack": "failure",
            "error": { "message": "Out of stock" }
        }))
        .unwrap();
        assert!(!failed.is_success());
        assert_eq!(failed.failure_reason(), "Out of stock");
    }

    #[test]
    fn test_delivery_charge_shapes() {
        let obj: DeliveryChargeDto = serde_json::from_value(json!({ "deliveryCharge": 85 })).unwrap();
        assert_eq!(obj.amount(), Decimal::from(85));
        let bare: DeliveryChargeDto = serde_json::from_value(json!("40")).unwrap();
        assert_eq!(bare.amount(), Decimal::from(40));
    }
}
