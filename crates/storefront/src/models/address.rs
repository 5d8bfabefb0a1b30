//! Delivery address models.

use serde::{Deserialize, Serialize};

use craftmart_core::{AddressId, CityId, CountryId, Pincode, StateId};

/// An id/name pair from the country → state → city master data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeoRef<Id> {
    pub id: Id,
    pub name: String,
}

/// A saved delivery address.
///
/// `local_id` is always present: a `tmp-…` id while the address is only
/// shown optimistically, the server id's text form once persisted.
/// `server_id` is authoritative once set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub local_id: String,
    pub server_id: Option<AddressId>,
    pub recipient_name: String,
    pub contact: String,
    pub line1: String,
    pub line2: Option<String>,
    pub line3: Option<String>,
    pub landmark: Option<String>,
    pub country: GeoRef<CountryId>,
    pub state: GeoRef<StateId>,
    pub city: GeoRef<CityId>,
    pub pincode: Pincode,
    pub is_default: bool,
}

impl Address {
    /// Identifier submitted with an order: the server id, else the local id.
    #[must_use]
    pub fn reference(&self) -> AddressRef {
        self.server_id
            .map_or_else(|| AddressRef::Local(self.local_id.clone()), AddressRef::Server)
    }

    /// Returns `true` while the address exists only on this device.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.server_id.is_none()
    }

    /// Single-line rendering for lists.
    #[must_use]
    pub fn one_line(&self) -> String {
        let mut parts: Vec<&str> = vec![self.line1.as_str()];
        parts.extend(self.line2.as_deref());
        parts.extend(self.line3.as_deref());
        parts.extend(self.landmark.as_deref());
        parts.push(&self.city.name);
        parts.push(&self.state.name);
        format!("{} - {}", parts.join(", "), self.pincode)
    }
}

/// Address identifier as sent to the order endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AddressRef {
    Server(AddressId),
    Local(String),
}

/// A validated address ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAddress {
    pub recipient_name: String,
    pub contact: String,
    pub line1: String,
    pub line2: Option<String>,
    pub line3: Option<String>,
    pub landmark: Option<String>,
    pub country: GeoRef<CountryId>,
    pub state: GeoRef<StateId>,
    pub city: GeoRef<CityId>,
    pub pincode: Pincode,
    pub is_default: bool,
}

impl NewAddress {
    /// Optimistic local copy shown until the server list arrives.
    #[must_use]
    pub fn into_pending(self, local_id: String) -> Address {
        Address {
            local_id,
            server_id: None,
            recipient_name: self.recipient_name,
            contact: self.contact,
            line1: self.line1,
            line2: self.line2,
            line3: self.line3,
            landmark: self.landmark,
            country: self.country,
            state: self.state,
            city: self.city,
            pincode: self.pincode,
            is_default: self.is_default,
        }
    }
}
