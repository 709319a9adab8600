//! Insurance claims and claim photos

use super::bookings::{parse_timestamp, Booking};
use super::{page_limit, required, required_str, Caller, Marketplace};
use crate::errors::{CoreError, CoreResult};
use crate::traits::Notification;
use crate::types::{Entity, Filter, Order, RecordQuery, Scope, Table, TenantId, UserId};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Largest accepted photo, in bytes
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Damage,
    Theft,
    Injury,
    Other,
}

impl std::str::FromStr for ClaimType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "damage" => Ok(ClaimType::Damage),
            "theft" => Ok(ClaimType::Theft),
            "injury" => Ok(ClaimType::Injury),
            "other" => Ok(ClaimType::Other),
            _ => Err(CoreError::Validation(format!("Invalid claim type: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Submitted,
    UnderReview,
    Approved,
    Rejected,
    Paid,
}

impl ClaimStatus {
    pub fn can_transition_to(&self, next: ClaimStatus) -> bool {
        use ClaimStatus::*;
        matches!(
            (self, next),
            (Submitted, UnderReview) | (Submitted, Rejected) | (UnderReview, Approved) | (UnderReview, Rejected) | (Approved, Paid)
        )
    }

    /// Claims still being processed
    pub fn is_open(&self) -> bool {
        matches!(self, ClaimStatus::Submitted | ClaimStatus::UnderReview | ClaimStatus::Approved)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Submitted => "submitted",
            ClaimStatus::UnderReview => "under_review",
            ClaimStatus::Approved => "approved",
            ClaimStatus::Rejected => "rejected",
            ClaimStatus::Paid => "paid",
        }
    }
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ClaimStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "submitted" => Ok(ClaimStatus::Submitted),
            "under_review" => Ok(ClaimStatus::UnderReview),
            "approved" => Ok(ClaimStatus::Approved),
            "rejected" => Ok(ClaimStatus::Rejected),
            "paid" => Ok(ClaimStatus::Paid),
            _ => Err(CoreError::Validation(format!("Invalid status: {}", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsuranceClaim {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub booking_id: Uuid,
    pub claimant_id: UserId,
    pub claim_type: ClaimType,
    pub description: String,
    pub amount_claimed_cents: i64,
    pub amount_approved_cents: Option<i64>,
    pub incident_date: DateTime<Utc>,
    pub status: ClaimStatus,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for InsuranceClaim {
    const TABLE: Table = Table::InsuranceClaims;

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClaimInput {
    pub booking_id: Option<Uuid>,
    pub claim_type: Option<String>,
    pub description: Option<String>,
    pub amount_claimed_cents: Option<i64>,
    pub incident_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClaimReview {
    pub status: Option<String>,
    pub amount_approved_cents: Option<i64>,
    pub resolution_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PhotoUpload {
    /// Base64 payload, optionally as a `data:` URL
    pub data: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimPhoto {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub claim_id: Uuid,
    pub storage_path: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: usize,
    pub uploaded_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Entity for ClaimPhoto {
    const TABLE: Table = Table::ClaimPhotos;

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}

/// File extension for an accepted image type
pub fn photo_extension(content_type: &str) -> CoreResult<&'static str> {
    match content_type.trim().to_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Ok("jpg"),
        "image/png" => Ok("png"),
        "image/webp" => Ok("webp"),
        other => Err(CoreError::validation(format!("Unsupported content type: {}", other))),
    }
}

/// Decode a base64 photo, stripping a `data:<type>;base64,` prefix
pub fn decode_photo(data: &str) -> CoreResult<Vec<u8>> {
    let payload = match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| CoreError::validation(format!("Invalid base64 payload: {}", e)))?;
    if bytes.is_empty() {
        return Err(CoreError::validation("Photo is empty"));
    }
    if bytes.len() > MAX_PHOTO_BYTES {
        return Err(CoreError::validation(format!(
            "Photo exceeds {} bytes",
            MAX_PHOTO_BYTES
        )));
    }
    Ok(bytes)
}

impl Marketplace {
    pub async fn file_claim(&self, caller: &Caller, input: ClaimInput) -> CoreResult<InsuranceClaim> {
        let tenant = caller.tenant()?;
        let scope = Scope::Tenant(tenant);

        let booking_id = required(input.booking_id, "booking_id")?;
        let claim_type: ClaimType = required_str(input.claim_type, "claim_type")?.parse()?;
        let description = required_str(input.description, "description")?;
        let amount_claimed_cents = required(input.amount_claimed_cents, "amount_claimed_cents")?;
        let incident_date = parse_timestamp(&required_str(input.incident_date, "incident_date")?, "incident_date")?;

        if amount_claimed_cents <= 0 {
            return Err(CoreError::validation("amount_claimed_cents must be greater than 0"));
        }
        let now = Utc::now();
        if incident_date > now {
            return Err(CoreError::validation("incident_date cannot be in the future"));
        }

        let booking = self
            .get_entity::<Booking>(&scope, booking_id)
            .await?
            .filter(|b| b.customer_id == caller.user_id || b.provider_id == Some(caller.user_id))
            .ok_or_else(|| CoreError::not_found("Booking"))?;

        let existing: Vec<InsuranceClaim> = self
            .select_entities(&scope, RecordQuery::new().eq("booking_id", booking.id))
            .await?;
        if existing.iter().any(|c| c.status.is_open()) {
            return Err(CoreError::Conflict("An open claim already exists for this booking".to_string()));
        }

        let claim = InsuranceClaim {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            booking_id: booking.id,
            claimant_id: caller.user_id,
            claim_type,
            description,
            amount_claimed_cents,
            amount_approved_cents: None,
            incident_date,
            status: ClaimStatus::Submitted,
            resolution_notes: None,
            created_at: now,
            updated_at: now,
        };
        let claim = self.insert_entity(&scope, &claim).await?;
        info!("Claim {} filed by {} for booking {}", claim.id, caller.user_id, booking.id);
        Ok(claim)
    }

    /// Own claims; admins see every claim and may filter by status
    pub async fn list_claims(&self, caller: &Caller, status: Option<&str>, limit: Option<u32>) -> CoreResult<Vec<InsuranceClaim>> {
        let mut query = RecordQuery::new()
            .order_by("created_at", Order::Desc)
            .limit(page_limit(limit));
        if !caller.role.is_admin() {
            query = query.eq("claimant_id", caller.user_id);
        }
        if let Some(status) = status.filter(|s| !s.is_empty()) {
            query = query.filter(Filter::eq("status", status.parse::<ClaimStatus>()?));
        }
        self.select_entities(&caller.scope(), query).await
    }

    pub async fn get_claim(&self, caller: &Caller, id: Uuid) -> CoreResult<InsuranceClaim> {
        self.get_entity::<InsuranceClaim>(&caller.scope(), id)
            .await?
            .filter(|c| c.claimant_id == caller.user_id || caller.role.is_admin())
            .ok_or_else(|| CoreError::not_found("Claim"))
    }

    /// Move a claim through review (admin only)
    pub async fn review_claim(&self, caller: &Caller, id: Uuid, review: ClaimReview) -> CoreResult<InsuranceClaim> {
        caller.require_admin()?;
        let next: ClaimStatus = required_str(review.status, "status")?.parse()?;
        let claim = self.get_claim(caller, id).await?;

        if !claim.status.can_transition_to(next) {
            return Err(CoreError::validation("Invalid status transition"));
        }

        let mut patch = serde_json::json!({"status": next, "updated_at": Utc::now()});
        if next == ClaimStatus::Approved {
            let approved = required(review.amount_approved_cents, "amount_approved_cents")?;
            if approved <= 0 || approved > claim.amount_claimed_cents {
                return Err(CoreError::validation(
                    "amount_approved_cents must be positive and not exceed the claimed amount",
                ));
            }
            patch["amount_approved_cents"] = serde_json::json!(approved);
        }
        if let Some(notes) = review.resolution_notes.filter(|n| !n.trim().is_empty()) {
            patch["resolution_notes"] = serde_json::json!(notes.trim());
        }

        let scope = Scope::Tenant(claim.tenant_id);
        let updated = self
            .update_entity::<InsuranceClaim>(&scope, id, patch)
            .await?
            .ok_or_else(|| CoreError::not_found("Claim"))?;
        info!("Claim {} {} -> {} by {}", id, claim.status, next, caller.user_id);

        match self.get_user(&scope, updated.claimant_id).await {
            Ok(claimant) => {
                self.notify_best_effort(Notification::email(
                    claimant.email,
                    "Insurance claim update",
                    format!("Your claim {} is now {}.", updated.id, updated.status.as_str().replace('_', " ")),
                ))
                .await
            }
            Err(e) => warn!("Cannot notify claimant of claim {}: {}", id, e),
        }
        Ok(updated)
    }

    /// Store a photo for the caller's own claim
    pub async fn upload_claim_photo(&self, caller: &Caller, claim_id: Uuid, upload: PhotoUpload) -> CoreResult<ClaimPhoto> {
        let tenant = caller.tenant()?;
        let claim = self
            .get_entity::<InsuranceClaim>(&Scope::Tenant(tenant), claim_id)
            .await?
            .filter(|c| c.claimant_id == caller.user_id)
            .ok_or_else(|| CoreError::not_found("Claim"))?;

        let content_type = required_str(upload.content_type, "content_type")?.to_lowercase();
        let extension = photo_extension(&content_type)?;
        let bytes = decode_photo(&required_str(upload.data, "data")?)?;

        let photo_id = Uuid::new_v4();
        let path = format!("claims/{}/{}/{}.{}", tenant, claim.id, photo_id, extension);
        let stored = self.storage.upload(&path, &content_type, bytes).await?;

        let photo = ClaimPhoto {
            id: photo_id,
            tenant_id: tenant,
            claim_id: claim.id,
            storage_path: stored.path,
            url: stored.url,
            content_type,
            size_bytes: stored.size,
            uploaded_by: caller.user_id,
            created_at: Utc::now(),
        };
        let photo = self.insert_entity(&Scope::Tenant(tenant), &photo).await?;
        info!("Photo {} uploaded for claim {} ({} bytes)", photo.id, claim.id, photo.size_bytes);
        Ok(photo)
    }
}
