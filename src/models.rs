use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;
use validator::Validate;

// ============================================================================
// ENUMS
// ============================================================================

/// Business category (also a Postgres enum)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "business_category")]
pub enum BusinessCategory {
    Restaurant,
    #[sqlx(rename = "Salon & Spa")]
    #[serde(rename = "Salon & Spa")]
    SalonSpa,
    #[sqlx(rename = "Gym & Fitness")]
    #[serde(rename = "Gym & Fitness")]
    GymFitness,
    #[sqlx(rename = "Auto Services")]
    #[serde(rename = "Auto Services")]
    AutoServices,
    Healthcare,
    Retail,
    Education,
    #[sqlx(rename = "Professional Services")]
    #[serde(rename = "Professional Services")]
    ProfessionalServices,
    #[sqlx(rename = "Home Services")]
    #[serde(rename = "Home Services")]
    HomeServices,
    Entertainment,
    Other,
}

// ============================================================================
// BUSINESSES
// ============================================================================

/// Postal address stored flattened on the business row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

/// Geographic point, defaults to the origin when the owner gives none
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::FromRow)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl Default for GeoPoint {
    fn default() -> Self {
        Self {
            longitude: 0.0,
            latitude: 0.0,
        }
    }
}

/// Contact details stored flattened on the business row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contact {
    pub phone: String,
    pub email: Option<String>,
    pub website: Option<String>,
}

/// Weekly opening hours, one free-text entry per weekday (JSONB column)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyHours {
    pub monday: String,
    pub tuesday: String,
    pub wednesday: String,
    pub thursday: String,
    pub friday: String,
    pub saturday: String,
    pub sunday: String,
}

impl Default for WeeklyHours {
    fn default() -> Self {
        const WEEKDAY: &str = "9:00 AM - 5:00 PM";
        Self {
            monday: WEEKDAY.into(),
            tuesday: WEEKDAY.into(),
            wednesday: WEEKDAY.into(),
            thursday: WEEKDAY.into(),
            friday: WEEKDAY.into(),
            saturday: "Closed".into(),
            sunday: "Closed".into(),
        }
    }
}

/// Business listing entity
///
/// `rating` and `review_count` are denormalized from the reviews table and
/// only ever written by the rating recompute, never by clients.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: String,
    pub category: BusinessCategory,
    #[sqlx(flatten)]
    pub address: Address,
    #[sqlx(flatten)]
    pub location: GeoPoint,
    #[sqlx(flatten)]
    pub contact: Contact,
    pub hours: Json<WeeklyHours>,
    pub images: Vec<String>,
    pub rating: f64,
    pub review_count: i32,
    pub is_active: bool,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
}

/// Helper struct used when inserting a new business
#[derive(Debug, Clone)]
pub struct NewBusiness {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: String,
    pub category: BusinessCategory,
    pub address: Address,
    pub location: GeoPoint,
    pub contact: Contact,
    pub hours: Json<WeeklyHours>,
    pub images: Vec<String>,
    pub is_active: bool,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// REVIEWS
// ============================================================================

/// Owner response attached to a review (JSONB column)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerResponse {
    pub text: String,
    pub responded_by: Uuid,
    pub responded_at: DateTime<Utc>,
}

/// Customer review of a business
///
/// References its business and author by id only; deleting a business
/// removes its reviews in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub business_id: Uuid,
    pub author_id: Uuid,
    pub rating: i32,
    pub title: String,
    pub comment: String,
    pub response: Option<Json<OwnerResponse>>,
    pub is_verified: bool,
    pub helpful: i32,
    pub created_at: DateTime<Utc>,
}

/// Helper struct used when inserting a new review
#[derive(Debug, Clone)]
pub struct NewReview {
    pub id: Uuid,
    pub business_id: Uuid,
    pub author_id: Uuid,
    pub rating: i32,
    pub title: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// REQUEST DTOs
// ============================================================================

/// Address payload inside business create/update requests
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddressRequest {
    #[validate(length(min = 1))]
    pub street: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub state: String,
    #[validate(length(min = 1))]
    pub zip_code: String,
    pub country: Option<String>,
}

impl AddressRequest {
    fn into_address(self) -> Address {
        Address {
            street: self.street,
            city: self.city,
            state: self.state,
            zip_code: self.zip_code,
            country: self.country.unwrap_or_else(|| "USA".to_string()),
        }
    }
}

/// Contact payload inside business create/update requests
#[derive(Debug, Deserialize, Validate)]
pub struct ContactRequest {
    #[validate(length(min = 1))]
    pub phone: String,
    #[validate(email)]
    pub email: Option<String>,
    pub website: Option<String>,
}

impl ContactRequest {
    fn into_contact(self) -> Contact {
        Contact {
            phone: self.phone,
            email: self.email,
            website: self.website,
        }
    }
}

/// Payload sent by business owners to list a business
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBusinessRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1, max = 1000))]
    pub description: String,
    pub category: BusinessCategory,
    #[validate(nested)]
    pub address: AddressRequest,
    pub location: Option<GeoPoint>,
    #[validate(nested)]
    pub contact: ContactRequest,
    pub hours: Option<WeeklyHours>,
    pub images: Option<Vec<String>>,
}

impl CreateBusinessRequest {
    pub fn into_new_business(self, owner_id: Uuid) -> NewBusiness {
        NewBusiness {
            id: Uuid::new_v4(),
            owner_id,
            name: self.name,
            description: self.description,
            category: self.category,
            address: self.address.into_address(),
            location: self.location.unwrap_or_default(),
            contact: self.contact.into_contact(),
            hours: Json(self.hours.unwrap_or_default()),
            images: self.images.unwrap_or_default(),
            is_active: true,
            featured: false,
            created_at: Utc::now(),
        }
    }
}

/// Patch sent by owners/admins to update a business; absent fields keep
/// their current values
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBusinessRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 1000))]
    pub description: Option<String>,
    pub category: Option<BusinessCategory>,
    #[validate(nested)]
    pub address: Option<AddressRequest>,
    pub location: Option<GeoPoint>,
    #[validate(nested)]
    pub contact: Option<ContactRequest>,
    pub hours: Option<WeeklyHours>,
    pub images: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub featured: Option<bool>,
}

impl UpdateBusinessRequest {
    /// Rating and review count are deliberately untouched here.
    pub fn apply_to_existing(self, existing: &mut Business) {
        if let Some(name) = self.name {
            existing.name = name;
        }
        if let Some(description) = self.description {
            existing.description = description;
        }
        if let Some(category) = self.category {
            existing.category = category;
        }
        if let Some(address) = self.address {
            existing.address = address.into_address();
        }
        if let Some(location) = self.location {
            existing.location = location;
        }
        if let Some(contact) = self.contact {
            existing.contact = contact.into_contact();
        }
        if let Some(hours) = self.hours {
            existing.hours = Json(hours);
        }
        if let Some(images) = self.images {
            existing.images = images;
        }
        if let Some(is_active) = self.is_active {
            existing.is_active = is_active;
        }
        if let Some(featured) = self.featured {
            existing.featured = featured;
        }
    }
}

/// Payload sent by customers to review a business
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub business_id: Uuid,
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1, max = 500))]
    pub comment: String,
}

impl CreateReviewRequest {
    pub fn into_new_review(self, author_id: Uuid) -> NewReview {
        NewReview {
            id: Uuid::new_v4(),
            business_id: self.business_id,
            author_id,
            rating: self.rating,
            title: self.title,
            comment: self.comment,
            created_at: Utc::now(),
        }
    }
}

/// Payload sent by the review's author to edit it
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReviewRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1, max = 500))]
    pub comment: String,
}

/// Payload sent by the business owner to respond to a review
#[derive(Debug, Deserialize, Validate)]
pub struct RespondToReviewRequest {
    #[validate(length(min = 1, max = 1000))]
    pub text: String,
}

// ============================================================================
// LISTING QUERIES
// ============================================================================

/// Hard cap on page size; anything above is clamped.
pub const MAX_PAGE_SIZE: i64 = 100;

const DEFAULT_BUSINESS_PAGE_SIZE: i64 = 12;
const DEFAULT_REVIEW_PAGE_SIZE: i64 = 10;

/// Total page count for a listing: ceil(total / limit).
pub fn total_pages(total: i64, limit: i64) -> i64 {
    (total + limit - 1) / limit
}

/// Query string accepted by the public business listing
#[derive(Debug, Default, Deserialize)]
pub struct BusinessListQuery {
    pub category: Option<String>,
    pub city: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl BusinessListQuery {
    /// Category filter; `all` or an empty string means no filter.
    pub fn category_filter(&self) -> Option<&str> {
        self.category
            .as_deref()
            .filter(|c| !c.is_empty() && *c != "all")
    }

    pub fn order_clause(&self) -> &'static str {
        match self.sort.as_deref() {
            Some("rating") => "rating DESC, review_count DESC",
            Some("newest") => "created_at DESC",
            _ => "featured DESC, rating DESC",
        }
    }

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_BUSINESS_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

/// Query string accepted by the review listing
#[derive(Debug, Default, Deserialize)]
pub struct ReviewListQuery {
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ReviewListQuery {
    pub fn order_clause(&self) -> &'static str {
        match self.sort.as_deref() {
            Some("rating-high") => "rating DESC, created_at DESC",
            Some("rating-low") => "rating ASC, created_at DESC",
            Some("helpful") => "helpful DESC, created_at DESC",
            _ => "created_at DESC",
        }
    }

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_REVIEW_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

// ============================================================================
// RESPONSE DTOs
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessListResponse {
    pub success: bool,
    pub count: usize,
    pub total: i64,
    pub pages: i64,
    pub current_page: i64,
    pub businesses: Vec<Business>,
}

#[derive(Debug, Serialize)]
pub struct OwnerListingsResponse {
    pub success: bool,
    pub count: usize,
    pub businesses: Vec<Business>,
}

#[derive(Debug, Serialize)]
pub struct BusinessResponse {
    pub success: bool,
    pub business: Business,
}

#[derive(Debug, Serialize)]
pub struct ReviewListResponse {
    pub success: bool,
    pub count: usize,
    pub total: i64,
    pub pages: i64,
    pub reviews: Vec<Review>,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub success: bool,
    pub review: Review,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_business() -> Business {
        Business {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Luigi's".into(),
            description: "Fresh pasta daily".into(),
            category: BusinessCategory::Restaurant,
            address: Address {
                street: "1 Main St".into(),
                city: "Springfield".into(),
                state: "IL".into(),
                zip_code: "62701".into(),
                country: "USA".into(),
            },
            location: GeoPoint::default(),
            contact: Contact {
                phone: "555-0100".into(),
                email: None,
                website: None,
            },
            hours: Json(WeeklyHours::default()),
            images: Vec::new(),
            rating: 4.5,
            review_count: 2,
            is_active: true,
            featured: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn category_serializes_with_display_labels() {
        let json = serde_json::to_string(&BusinessCategory::SalonSpa).unwrap();
        assert_eq!(json, "\"Salon & Spa\"");
        let parsed: BusinessCategory = serde_json::from_str("\"Home Services\"").unwrap();
        assert_eq!(parsed, BusinessCategory::HomeServices);
    }

    #[test]
    fn unknown_category_is_rejected() {
        assert!(serde_json::from_str::<BusinessCategory>("\"Plumbing\"").is_err());
    }

    #[test]
    fn partial_update_only_touches_supplied_fields() {
        let mut business = sample_business();
        let patch: UpdateBusinessRequest =
            serde_json::from_str(r#"{ "featured": true }"#).unwrap();
        patch.apply_to_existing(&mut business);

        assert!(business.featured);
        assert_eq!(business.name, "Luigi's");
        assert_eq!(business.description, "Fresh pasta daily");
        assert_eq!(business.category, BusinessCategory::Restaurant);
        assert_eq!(business.address.city, "Springfield");
        assert_eq!(business.contact.phone, "555-0100");
        assert!(business.is_active);
        // the denormalized summary never moves through updates
        assert_eq!(business.rating, 4.5);
        assert_eq!(business.review_count, 2);
    }

    #[test]
    fn full_update_replaces_supplied_fields() {
        let mut business = sample_business();
        let patch = UpdateBusinessRequest {
            name: Some("Mario's".into()),
            is_active: Some(false),
            ..Default::default()
        };
        patch.apply_to_existing(&mut business);

        assert_eq!(business.name, "Mario's");
        assert!(!business.is_active);
        assert_eq!(business.rating, 4.5);
    }

    #[test]
    fn update_patch_still_validates_present_fields() {
        let patch = UpdateBusinessRequest {
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(patch.validate().is_err());

        let empty = UpdateBusinessRequest::default();
        assert!(empty.validate().is_ok());
    }

    #[test]
    fn schema_default_hours_decode_to_standard_schedule() {
        // Mirrors the hours column default in migrations/0001.
        let hours: WeeklyHours = serde_json::from_str(
            r#"{
                "monday": "9:00 AM - 5:00 PM",
                "tuesday": "9:00 AM - 5:00 PM",
                "wednesday": "9:00 AM - 5:00 PM",
                "thursday": "9:00 AM - 5:00 PM",
                "friday": "9:00 AM - 5:00 PM",
                "saturday": "Closed",
                "sunday": "Closed"
            }"#,
        )
        .unwrap();
        let default = WeeklyHours::default();
        assert_eq!(hours.monday, default.monday);
        assert_eq!(hours.wednesday, default.wednesday);
        assert_eq!(hours.saturday, default.saturday);
        assert_eq!(hours.sunday, default.sunday);
    }

    #[test]
    fn weekly_hours_default_to_standard_schedule() {
        let hours = WeeklyHours::default();
        assert_eq!(hours.monday, "9:00 AM - 5:00 PM");
        assert_eq!(hours.friday, "9:00 AM - 5:00 PM");
        assert_eq!(hours.saturday, "Closed");
        assert_eq!(hours.sunday, "Closed");
    }

    #[test]
    fn business_listing_defaults() {
        let query = BusinessListQuery::default();
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), 12);
        assert_eq!(query.offset(), 0);
        assert_eq!(query.order_clause(), "featured DESC, rating DESC");
        assert!(query.category_filter().is_none());
    }

    #[test]
    fn business_listing_sorts() {
        let by_rating = BusinessListQuery {
            sort: Some("rating".into()),
            ..Default::default()
        };
        assert_eq!(by_rating.order_clause(), "rating DESC, review_count DESC");

        let newest = BusinessListQuery {
            sort: Some("newest".into()),
            ..Default::default()
        };
        assert_eq!(newest.order_clause(), "created_at DESC");
    }

    #[test]
    fn category_all_means_no_filter() {
        let query = BusinessListQuery {
            category: Some("all".into()),
            ..Default::default()
        };
        assert!(query.category_filter().is_none());

        let query = BusinessListQuery {
            category: Some("Restaurant".into()),
            ..Default::default()
        };
        assert_eq!(query.category_filter(), Some("Restaurant"));
    }

    #[test]
    fn pagination_resolves_last_partial_page() {
        // total=25, limit=12, page=3 -> one trailing item on the third page
        let query = BusinessListQuery {
            page: Some(3),
            limit: Some(12),
            ..Default::default()
        };
        assert_eq!(query.offset(), 24);
        assert_eq!(total_pages(25, 12), 3);
    }

    #[test]
    fn pagination_clamps_hostile_input() {
        let query = BusinessListQuery {
            page: Some(-4),
            limit: Some(1_000_000),
            ..Default::default()
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), MAX_PAGE_SIZE);
    }

    #[test]
    fn empty_listing_has_zero_pages() {
        assert_eq!(total_pages(0, 12), 0);
        assert_eq!(total_pages(12, 12), 1);
        assert_eq!(total_pages(13, 12), 2);
    }

    #[test]
    fn review_listing_sorts() {
        let recent = ReviewListQuery::default();
        assert_eq!(recent.order_clause(), "created_at DESC");
        assert_eq!(recent.limit(), 10);

        let helpful = ReviewListQuery {
            sort: Some("helpful".into()),
            ..Default::default()
        };
        assert_eq!(helpful.order_clause(), "helpful DESC, created_at DESC");

        let low = ReviewListQuery {
            sort: Some("rating-low".into()),
            ..Default::default()
        };
        assert_eq!(low.order_clause(), "rating ASC, created_at DESC");
    }

    #[test]
    fn create_review_request_validates_rating_range() {
        let bad = CreateReviewRequest {
            business_id: Uuid::new_v4(),
            rating: 6,
            title: "Great".into(),
            comment: "Really great".into(),
        };
        assert!(bad.validate().is_err());

        let good = CreateReviewRequest { rating: 5, ..bad };
        assert!(good.validate().is_ok());
    }

    #[test]
    fn create_business_request_rejects_blank_required_fields() {
        let request = CreateBusinessRequest {
            name: "".into(),
            description: "Fresh pasta daily".into(),
            category: BusinessCategory::Restaurant,
            address: AddressRequest {
                street: "1 Main St".into(),
                city: "Springfield".into(),
                state: "IL".into(),
                zip_code: "62701".into(),
                country: None,
            },
            location: None,
            contact: ContactRequest {
                phone: "555-0100".into(),
                email: None,
                website: None,
            },
            hours: None,
            images: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn new_business_gets_defaults() {
        let owner = Uuid::new_v4();
        let request = CreateBusinessRequest {
            name: "Luigi's".into(),
            description: "Fresh pasta daily".into(),
            category: BusinessCategory::Restaurant,
            address: AddressRequest {
                street: "1 Main St".into(),
                city: "Springfield".into(),
                state: "IL".into(),
                zip_code: "62701".into(),
                country: None,
            },
            location: None,
            contact: ContactRequest {
                phone: "555-0100".into(),
                email: None,
                website: None,
            },
            hours: None,
            images: None,
        };
        let new_business = request.into_new_business(owner);
        assert_eq!(new_business.owner_id, owner);
        assert_eq!(new_business.address.country, "USA");
        assert_eq!(new_business.location.longitude, 0.0);
        assert_eq!(new_business.location.latitude, 0.0);
        assert!(new_business.is_active);
        assert!(!new_business.featured);
        assert!(new_business.images.is_empty());
    }
}
