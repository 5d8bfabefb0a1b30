//! Address book and the country → state → city cascade.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use craftmart_core::{CityId, CountryId, Pincode, StateId};

use crate::api::cache::{CacheKey, CacheValue};
use crate::api::conversions::{convert_address, convert_geo};
use crate::api::endpoints;
use crate::api::types::{AddressDto, AddressRequest, GeoDto};
use crate::api::{ApiClient, ApiError};
use crate::checkout::Checkout;
use crate::error::{AppError, FieldErrors, FormField, Result};
use crate::models::{Address, GeoRef, NewAddress};
use crate::optimistic::optimistic_mutation;

/// Address form input as typed by the shopper.
#[derive(Debug, Clone, Default)]
pub struct AddressDraft {
    pub recipient_name: String,
    pub contact: String,
    pub line1: String,
    pub line2: String,
    pub line3: String,
    pub landmark: String,
    pub country: Option<GeoRef<CountryId>>,
    pub state: Option<GeoRef<StateId>>,
    pub city: Option<GeoRef<CityId>>,
    pub pincode: String,
    pub is_default: bool,
}

fn optional(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Ten digits, ignoring spaces and a leading `+91`.
fn is_valid_contact(raw: &str) -> bool {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = compact.strip_prefix("+91").unwrap_or(&compact);
    digits.len() == 10 && digits.bytes().all(|b| b.is_ascii_digit())
}

impl AddressDraft {
    /// Check every field and build the address to persist.
    ///
    /// # Errors
    ///
    /// Returns one message per invalid field.
    pub fn validate(&self) -> std::result::Result<NewAddress, FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.check(
            self.recipient_name.trim().is_empty(),
            FormField::RecipientName,
            "Recipient name is required",
        );
        errors.check(
            !is_valid_contact(&self.contact),
            FormField::Contact,
            "Enter a valid 10-digit contact number",
        );
        errors.check(
            self.line1.trim().is_empty(),
            FormField::AddressLine1,
            "Address line 1 is required",
        );
        errors.check(self.country.is_none(), FormField::Country, "Select a country");
        errors.check(self.state.is_none(), FormField::State, "Select a state");
        errors.check(self.city.is_none(), FormField::City, "Select a city");

        let pincode = Pincode::parse(self.pincode.trim());
        if pincode.is_err() {
            errors.insert(FormField::Pincode, "Enter a valid 6-digit pincode");
        }

        match (pincode, &self.country, &self.state, &self.city) {
            (Ok(pincode), Some(country), Some(state), Some(city)) if errors.is_empty() => {
                Ok(NewAddress {
                    recipient_name: self.recipient_name.trim().to_string(),
                    contact: self.contact.trim().to_string(),
                    line1: self.line1.trim().to_string(),
                    line2: optional(&self.line2),
                    line3: optional(&self.line3),
                    landmark: optional(&self.landmark),
                    country: country.clone(),
                    state: state.clone(),
                    city: city.clone(),
                    pincode,
                    is_default: self.is_default,
                })
            }
            _ => Err(errors),
        }
    }
}

/// Current position in the geo cascade.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoCascade {
    pub country: Option<GeoRef<CountryId>>,
    pub state: Option<GeoRef<StateId>>,
    pub city: Option<GeoRef<CityId>>,
    pub states: Vec<GeoRef<StateId>>,
    pub cities: Vec<GeoRef<CityId>>,
}

type CountryPrefetch = JoinHandle<std::result::Result<Vec<GeoRef<CountryId>>, ApiError>>;

// =============================================================================
// AddressBook
// =============================================================================

/// Saved addresses for the signed-in shopper.
#[derive(Clone)]
pub struct AddressBook {
    inner: Arc<AddressBookInner>,
}

struct AddressBookInner {
    api: ApiClient,
    checkout: Checkout,
    entries: Mutex<Vec<Address>>,
    cascade: Mutex<GeoCascade>,
    prefetch: Mutex<Option<CountryPrefetch>>,
}

impl std::fmt::Debug for AddressBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressBook")
            .field("entries", &self.inner.entries.lock().len())
            .field("cascade", &*self.inner.cascade.lock())
            .finish_non_exhaustive()
    }
}

impl AddressBook {
    #[must_use]
    pub fn new(api: ApiClient, checkout: Checkout) -> Self {
        Self {
            inner: Arc::new(AddressBookInner {
                api,
                checkout,
                entries: Mutex::new(Vec::new()),
                cascade: Mutex::new(GeoCascade::default()),
                prefetch: Mutex::new(None),
            }),
        }
    }

    /// Addresses currently shown, including any not yet persisted.
    #[must_use]
    pub fn entries(&self) -> Vec<Address> {
        self.inner.entries.lock().clone()
    }

    /// Addresses cached on this device from the last fetch.
    #[must_use]
    pub fn cached(&self) -> Vec<Address> {
        self.inner.api.session().cached_addresses()
    }

    /// Fetch the server list, cache it locally and hand it to checkout.
    ///
    /// # Errors
    ///
    /// Returns an error if signed out or the list cannot be fetched.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Address>> {
        let customer = self
            .inner
            .api
            .session()
            .customer_id()
            .ok_or(ApiError::AuthRequired)?;
        let dtos: Option<Vec<AddressDto>> = self
            .inner
            .api
            .get_optional(&endpoints::addresses(customer))
            .await?;
        let addresses: Vec<Address> = dtos
            .unwrap_or_default()
            .into_iter()
            .filter_map(convert_address)
            .collect();

        if let Err(e) = self.inner.api.session().cache_addresses(&addresses) {
            warn!(error = %e, "Failed to cache addresses");
        }
        (*self.inner.entries.lock()).clone_from(&addresses);
        self.inner.checkout.set_addresses(addresses.clone());
        debug!(count = addresses.len(), "Addresses fetched");
        Ok(addresses)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Add-address form
    // ─────────────────────────────────────────────────────────────────────────

    /// Open the add-address form: reset the cascade and start loading
    /// countries in the background.
    pub fn open_add(&self) {
        *self.inner.cascade.lock() = GeoCascade::default();
        let api = self.inner.api.clone();
        let handle = tokio::spawn(async move { fetch_countries(&api).await });
        if let Some(previous) = self.inner.prefetch.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Country list, from the background prefetch when one is running.
    ///
    /// # Errors
    ///
    /// Returns an error if the countries cannot be fetched.
    pub async fn countries(&self) -> Result<Vec<GeoRef<CountryId>>> {
        let pending = self.inner.prefetch.lock().take();
        if let Some(handle) = pending {
            match handle.await {
                Ok(result) => return Ok(result?),
                Err(e) => debug!(error = %e, "Country prefetch did not finish"),
            }
        }
        Ok(fetch_countries(&self.inner.api).await?)
    }

    #[must_use]
    pub fn cascade(&self) -> GeoCascade {
        self.inner.cascade.lock().clone()
    }

    /// Choose a country: clears state and city, then loads its states.
    ///
    /// # Errors
    ///
    /// Returns an error if the states cannot be fetched.
    #[instrument(skip(self), fields(country = %country.name))]
    pub async fn select_country(&self, country: GeoRef<CountryId>) -> Result<Vec<GeoRef<StateId>>> {
        let country_id = country.id;
        {
            let mut cascade = self.inner.cascade.lock();
            cascade.country = Some(country);
            cascade.state = None;
            cascade.city = None;
            cascade.states.clear();
            cascade.cities.clear();
        }

        let states = fetch_states(&self.inner.api, country_id).await?;
        let mut cascade = self.inner.cascade.lock();
        // A later selection wins over a slow response for an earlier one.
        if cascade.country.as_ref().map(|c| c.id) == Some(country_id) {
            cascade.states.clone_from(&states);
        }
        Ok(states)
    }

    /// Choose a state: clears the city, then loads its cities.
    ///
    /// # Errors
    ///
    /// Returns an error if the cities cannot be fetched.
    #[instrument(skip(self), fields(state = %state.name))]
    pub async fn select_state(&self, state: GeoRef<StateId>) -> Result<Vec<GeoRef<CityId>>> {
        let state_id = state.id;
        {
            let mut cascade = self.inner.cascade.lock();
            cascade.state = Some(state);
            cascade.city = None;
            cascade.cities.clear();
        }

        let cities = fetch_cities(&self.inner.api, state_id).await?;
        let mut cascade = self.inner.cascade.lock();
        if cascade.state.as_ref().map(|s| s.id) == Some(state_id) {
            cascade.cities.clone_from(&cities);
        }
        Ok(cities)
    }

    pub fn select_city(&self, city: GeoRef<CityId>) {
        self.inner.cascade.lock().city = Some(city);
    }

    /// Draft pre-filled with the cascade selection.
    #[must_use]
    pub fn draft(&self) -> AddressDraft {
        let cascade = self.inner.cascade.lock();
        AddressDraft {
            country: cascade.country.clone(),
            state: cascade.state.clone(),
            city: cascade.city.clone(),
            ..AddressDraft::default()
        }
    }

    /// Validate and persist a new address.
    ///
    /// The address is shown immediately under a temporary id. On success
    /// the whole list is replaced by the server's and its first address is
    /// selected; on failure the server list is re-fetched. If no server list
    /// can be fetched the temporary entry is dropped.
    ///
    /// # Errors
    ///
    /// Returns field errors without any request when the draft is invalid,
    /// otherwise the server error.
    #[instrument(skip(self, draft))]
    pub async fn save(&self, draft: &AddressDraft) -> Result<Vec<Address>> {
        let new_address = draft.validate()?;
        let customer = self
            .inner
            .api
            .session()
            .customer_id()
            .ok_or(ApiError::AuthRequired)?;

        let local_id = format!("tmp-{}", uuid::Uuid::new_v4());
        let pending = new_address.clone().into_pending(local_id.clone());
        let request = AddressRequest {
            recipient_name: &new_address.recipient_name,
            contact: &new_address.contact,
            address_line1: &new_address.line1,
            address_line2: new_address.line2.as_deref(),
            address_line3: new_address.line3.as_deref(),
            landmark: new_address.landmark.as_deref(),
            country_id: new_address.country.id,
            state_id: new_address.state.id,
            city_id: new_address.city.id,
            pincode: new_address.pincode.as_str(),
            is_default: new_address.is_default,
        };
        let api = &self.inner.api;
        let path = endpoints::addresses(customer);

        let saved = optimistic_mutation(
            &self.inner.entries,
            |entries| entries.push(pending),
            async {
                let body = api.post(&path, &request).await?;
                ApiClient::expect_ack(body).map_err(AppError::from)
            },
            || async { self.list().await.map(|_| ()) },
        )
        .await;

        let listed = match saved {
            Ok(()) => self.list().await,
            Err(e) => Err(e),
        };
        // Without a fresh server list the temporary entry has nothing to replace it.
        if listed.is_err() {
            self.inner.entries.lock().retain(|a| a.local_id != local_id);
        }
        let addresses = listed?;
        if let Some(first) = addresses.first() {
            self.inner.checkout.select_address(&first.local_id);
        }
        info!(count = addresses.len(), "Address saved");
        Ok(addresses)
    }
}

// =============================================================================
// Geo master data
// =============================================================================

async fn fetch_countries(
    api: &ApiClient,
) -> std::result::Result<Vec<GeoRef<CountryId>>, ApiError> {
    if let Some(CacheValue::Countries(list)) = api.cache().get(&CacheKey::Countries).await {
        debug!("Cache hit for countries");
        return Ok(list);
    }
    let dtos: Vec<GeoDto<CountryId>> = api.get_data(endpoints::COUNTRIES).await?;
    let list: Vec<_> = dtos.into_iter().map(convert_geo).collect();
    api.cache()
        .insert(CacheKey::Countries, CacheValue::Countries(list.clone()))
        .await;
    Ok(list)
}

async fn fetch_states(
    api: &ApiClient,
    country: CountryId,
) -> std::result::Result<Vec<GeoRef<StateId>>, ApiError> {
    let key = CacheKey::States(country);
    if let Some(CacheValue::States(list)) = api.cache().get(&key).await {
        return Ok(list);
    }
    let dtos: Vec<GeoDto<StateId>> = api.get_data(&endpoints::states(country)).await?;
    let list: Vec<_> = dtos.into_iter().map(convert_geo).collect();
    api.cache().insert(key, CacheValue::States(list.clone())).await;
    Ok(list)
}

async fn fetch_cities(
    api: &ApiClient,
    state: StateId,
) -> std::result::Result<Vec<GeoRef<CityId>>, ApiError> {
    let key = CacheKey::Cities(state);
    if let Some(CacheValue::Cities(list)) = api.cache().get(&key).await {
        return Ok(list);
    }
    let dtos: Vec<GeoDto<CityId>> = api.get_data(&endpoints::cities(state)).await?;
    let list: Vec<_> = dtos.into_iter().map(convert_geo).collect();
    api.cache().insert(key, CacheValue::Cities(list.clone())).await;
    Ok(list)
}
