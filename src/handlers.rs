use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::require_actor;
use crate::database::{BusinessFilter, Database};
use crate::errors::{is_unique_violation, ApiError};
use crate::models::{
    total_pages, BusinessListQuery, BusinessListResponse, BusinessResponse, CreateBusinessRequest,
    CreateReviewRequest, MessageResponse, OwnerListingsResponse, OwnerResponse,
    RespondToReviewRequest, ReviewListQuery, ReviewListResponse, ReviewResponse,
    UpdateBusinessRequest, UpdateReviewRequest,
};

/// Recompute failures must not fail the review mutation that triggered them;
/// the aggregate stays stale until the next successful recompute.
async fn recompute_rating_or_log(db: &Database, business_id: Uuid) {
    if let Err(err) = db.recompute_business_rating(business_id).await {
        log::error!("Failed to recompute rating for business {business_id}: {err:?}");
    }
}

// ============================================================================
// HEALTH CHECK
// ============================================================================

#[get("/health")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "localbiz-directory-service",
        "timestamp": Utc::now()
    }))
}

// ============================================================================
// BUSINESSES
// ============================================================================

#[get("/business")]
pub async fn list_businesses(
    db: web::Data<Database>,
    query: web::Query<BusinessListQuery>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();

    let filter = BusinessFilter {
        category: query.category_filter(),
        city: query.city.as_deref().filter(|c| !c.is_empty()),
        search: query.search.as_deref().filter(|s| !s.is_empty()),
    };

    let limit = query.limit();
    let businesses = db
        .list_businesses(&filter, query.order_clause(), limit, query.offset())
        .await?;
    let total = db.count_businesses(&filter).await?;

    Ok(HttpResponse::Ok().json(BusinessListResponse {
        success: true,
        count: businesses.len(),
        total,
        pages: total_pages(total, limit),
        current_page: query.page(),
        businesses,
    }))
}

#[get("/business/my/listings")]
pub async fn list_my_businesses(
    req: HttpRequest,
    db: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
    let actor = require_actor(&req)?;

    let businesses = db.list_businesses_for_owner(actor.id).await?;

    Ok(HttpResponse::Ok().json(OwnerListingsResponse {
        success: true,
        count: businesses.len(),
        businesses,
    }))
}

#[get("/business/{business_id}")]
pub async fn get_business(
    db: web::Data<Database>,
    business_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let business = db
        .get_business(business_id.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("Business not found".into()))?;

    Ok(HttpResponse::Ok().json(BusinessResponse {
        success: true,
        business,
    }))
}

#[post("/business")]
pub async fn create_business(
    req: HttpRequest,
    db: web::Data<Database>,
    payload: web::Json<CreateBusinessRequest>,
) -> Result<HttpResponse, ApiError> {
    let actor = require_actor(&req)?;
    if !actor.can_list_businesses() {
        return Err(ApiError::Forbidden(
            "Only business owner accounts can create listings".into(),
        ));
    }

    let body = payload.into_inner();
    body.validate()?;

    let business = db.create_business(body.into_new_business(actor.id)).await?;

    Ok(HttpResponse::Created().json(BusinessResponse {
        success: true,
        business,
    }))
}

#[put("/business/{business_id}")]
pub async fn update_business(
    req: HttpRequest,
    db: web::Data<Database>,
    business_id: web::Path<Uuid>,
    payload: web::Json<UpdateBusinessRequest>,
) -> Result<HttpResponse, ApiError> {
    let actor = require_actor(&req)?;

    let body = payload.into_inner();
    body.validate()?;

    let mut business = db
        .get_business(business_id.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("Business not found".into()))?;

    if !actor.can_manage(business.owner_id) {
        return Err(ApiError::Forbidden(
            "Not authorized to update this business".into(),
        ));
    }

    body.apply_to_existing(&mut business);
    let business = db.update_business(business).await?;

    Ok(HttpResponse::Ok().json(BusinessResponse {
        success: true,
        business,
    }))
}

#[delete("/business/{business_id}")]
pub async fn delete_business(
    req: HttpRequest,
    db: web::Data<Database>,
    business_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let actor = require_actor(&req)?;
    let business_id = business_id.into_inner();

    let business = db
        .get_business(business_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Business not found".into()))?;

    if !actor.can_manage(business.owner_id) {
        return Err(ApiError::Forbidden(
            "Not authorized to delete this business".into(),
        ));
    }

    match db.delete_business(business_id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(MessageResponse {
            success: true,
            message: "Business deleted successfully".into(),
        })),
        Err(sqlx::Error::RowNotFound) => Err(ApiError::NotFound("Business not found".into())),
        Err(err) => Err(err.into()),
    }
}

// ============================================================================
// REVIEWS
// ============================================================================

#[get("/review/business/{business_id}")]
pub async fn list_reviews_for_business(
    db: web::Data<Database>,
    business_id: web::Path<Uuid>,
    query: web::Query<ReviewListQuery>,
) -> Result<HttpResponse, ApiError> {
    let business_id = business_id.into_inner();
    let query = query.into_inner();

    let limit = query.limit();
    let reviews = db
        .list_reviews(business_id, query.order_clause(), limit, query.offset())
        .await?;
    let total = db.count_reviews(business_id).await?;

    Ok(HttpResponse::Ok().json(ReviewListResponse {
        success: true,
        count: reviews.len(),
        total,
        pages: total_pages(total, limit),
        reviews,
    }))
}

#[post("/review")]
pub async fn create_review(
    req: HttpRequest,
    db: web::Data<Database>,
    payload: web::Json<CreateReviewRequest>,
) -> Result<HttpResponse, ApiError> {
    let actor = require_actor(&req)?;

    let body = payload.into_inner();
    body.validate()?;

    db.get_business(body.business_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Business not found".into()))?;

    let review = match db.create_review(body.into_new_review(actor.id)).await {
        Ok(review) => review,
        Err(err) if is_unique_violation(&err) => {
            return Err(ApiError::Duplicate(
                "You have already reviewed this business".into(),
            ));
        }
        Err(err) => return Err(err.into()),
    };

    recompute_rating_or_log(&db, review.business_id).await;

    Ok(HttpResponse::Created().json(ReviewResponse {
        success: true,
        review,
    }))
}

#[put("/review/{review_id}")]
pub async fn update_review(
    req: HttpRequest,
    db: web::Data<Database>,
    review_id: web::Path<Uuid>,
    payload: web::Json<UpdateReviewRequest>,
) -> Result<HttpResponse, ApiError> {
    let actor = require_actor(&req)?;

    let body = payload.into_inner();
    body.validate()?;

    let existing = db
        .get_review(review_id.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("Review not found".into()))?;

    // Author-only: even admins cannot rewrite someone else's review text.
    if existing.author_id != actor.id {
        return Err(ApiError::Forbidden(
            "Not authorized to update this review".into(),
        ));
    }

    let review = db
        .update_review(existing.id, body.rating, body.title, body.comment)
        .await?;

    recompute_rating_or_log(&db, review.business_id).await;

    Ok(HttpResponse::Ok().json(ReviewResponse {
        success: true,
        review,
    }))
}

#[delete("/review/{review_id}")]
pub async fn delete_review(
    req: HttpRequest,
    db: web::Data<Database>,
    review_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let actor = require_actor(&req)?;

    let review = db
        .get_review(review_id.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("Review not found".into()))?;

    if !actor.can_manage(review.author_id) {
        return Err(ApiError::Forbidden(
            "Not authorized to delete this review".into(),
        ));
    }

    match db.delete_review(review.id).await {
        Ok(()) => {}
        Err(sqlx::Error::RowNotFound) => {
            return Err(ApiError::NotFound("Review not found".into()))
        }
        Err(err) => return Err(err.into()),
    }

    recompute_rating_or_log(&db, review.business_id).await;

    Ok(HttpResponse::Ok().json(MessageResponse {
        success: true,
        message: "Review deleted successfully".into(),
    }))
}

#[post("/review/{review_id}/response")]
pub async fn respond_to_review(
    req: HttpRequest,
    db: web::Data<Database>,
    review_id: web::Path<Uuid>,
    payload: web::Json<RespondToReviewRequest>,
) -> Result<HttpResponse, ApiError> {
    let actor = require_actor(&req)?;

    let body = payload.into_inner();
    body.validate()?;

    let review = db
        .get_review(review_id.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("Review not found".into()))?;

    let business = db
        .get_business(review.business_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Business not found".into()))?;

    if !actor.can_manage(business.owner_id) {
        return Err(ApiError::Forbidden(
            "Only business owner can respond to reviews".into(),
        ));
    }

    let review = db
        .set_review_response(
            review.id,
            OwnerResponse {
                text: body.text,
                responded_by: actor.id,
                responded_at: Utc::now(),
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(ReviewResponse {
        success: true,
        review,
    }))
}

#[post("/review/{review_id}/helpful")]
pub async fn mark_review_helpful(
    req: HttpRequest,
    db: web::Data<Database>,
    review_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    require_actor(&req)?;

    let review = match db.increment_review_helpful(review_id.into_inner()).await {
        Ok(review) => review,
        Err(sqlx::Error::RowNotFound) => {
            return Err(ApiError::NotFound("Review not found".into()))
        }
        Err(err) => return Err(err.into()),
    };

    Ok(HttpResponse::Ok().json(ReviewResponse {
        success: true,
        review,
    }))
}
