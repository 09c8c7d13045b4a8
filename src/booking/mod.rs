use serde::{Deserialize, Serialize};

use crate::directory::Directory;
use crate::error::{Result, SyncError};

/// Grace period on both sides of the booked window. A booking becomes
/// joinable exactly this long before its start time and stays joinable for
/// `duration + grace` after it. Externally observable, do not tune.
pub const JOIN_GRACE_MS: i64 = 15 * 60 * 1000;

pub const DEFAULT_DURATION_MIN: i64 = 60;

/// External booking record. Read-only input to the resolver; the core never
/// writes bookings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub normalized_id: String,
    pub tutor_id: String,
    pub student_id: Option<String>,
    pub start_time_ms: i64,
    pub duration_min: i64,
}

/// The identity asking to join, as verified by the auth layer upstream.
#[derive(Debug, Clone)]
pub struct Caller {
    /// None when the request is unauthenticated.
    pub uid: Option<String>,
    /// Admin and observer callers are exempt from the student-match check.
    pub privileged: bool,
}

impl Caller {
    pub fn student(uid: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            privileged: false,
        }
    }

    pub fn privileged(uid: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            privileged: true,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            uid: None,
            privileged: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomAccess {
    pub room_id: String,
}

/// Booking ids are short human-entered references; normalize by trimming
/// and uppercasing.
pub fn normalize_id(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Split a composite `<id>_<startMsHint>` key on its last underscore. The
/// suffix must parse as a millisecond epoch.
pub fn split_composite(raw: &str) -> Option<(&str, i64)> {
    let (base, suffix) = raw.rsplit_once('_')?;
    if base.is_empty() {
        return None;
    }
    let hint: i64 = suffix.parse().ok()?;
    Some((base, hint))
}

/// Map a raw booking key to a joinable room for `caller` at `now_ms`.
///
/// Lookup is an ordered fallback chain, first hit wins:
/// 1. exact lookup by the normalized key,
/// 2. composite key: lookup the normalized id portion and verify that
///    `normalized_id + "_" + start_ms_hint` recomposes the key,
/// 3. the raw, un-normalized key as a direct id,
/// 4. field query on `normalized_id`, most recent `start_time` first.
///
/// The chain order and the grace arithmetic are externally observable
/// contract, not implementation detail.
pub async fn resolve<D: Directory>(
    directory: &D,
    raw_key: &str,
    caller: &Caller,
    now_ms: i64,
) -> Result<RoomAccess> {
    let booking = lookup(directory, raw_key).await?;
    tracing::debug!(
        booking_id = %booking.id,
        raw_key = %raw_key,
        "Booking resolved, checking eligibility"
    );

    check_eligibility(&booking, caller, now_ms)?;

    let tutor = directory
        .get_user_profile(&booking.tutor_id)
        .await
        .ok_or_else(|| SyncError::TutorMissing(booking.id.clone()))?;

    let room_id = tutor
        .room_id
        .filter(|r| !r.is_empty())
        .ok_or_else(|| SyncError::TutorNoRoomId(booking.tutor_id.clone()))?;

    Ok(RoomAccess { room_id })
}

async fn lookup<D: Directory>(directory: &D, raw_key: &str) -> Result<Booking> {
    let normalized_key = normalize_id(raw_key);

    // 1. exact lookup by normalized key
    if let Some(booking) = directory.get_booking(&normalized_key).await {
        return Ok(booking);
    }

    // 2. composite key lookup
    let composite = split_composite(raw_key);
    if let Some((base, hint)) = composite {
        let normalized_base = normalize_id(base);
        if let Some(booking) = directory.get_booking(&normalized_base).await {
            if format!("{}_{}", booking.normalized_id, hint) == normalized_key {
                return Ok(booking);
            }
        }
    }

    // 3. raw key as a direct id
    if let Some(booking) = directory.get_booking(raw_key).await {
        return Ok(booking);
    }

    // 4. field query, most recent start time wins
    let field_key = match composite {
        Some((base, _)) => normalize_id(base),
        None => normalized_key,
    };
    if let Some(booking) = directory
        .find_bookings_by_normalized_id(&field_key)
        .await
        .into_iter()
        .next()
    {
        return Ok(booking);
    }

    Err(SyncError::BookingNotFound(raw_key.to_string()))
}

/// Pure eligibility decision over (booking, caller, clock). Short-circuits
/// with the first failing reason, in this order: NotSignedIn,
/// StudentMismatch, SessionNotLive.
pub fn check_eligibility(booking: &Booking, caller: &Caller, now_ms: i64) -> Result<()> {
    let uid = caller.uid.as_deref().ok_or(SyncError::NotSignedIn)?;

    if !caller.privileged {
        if let Some(student_id) = booking.student_id.as_deref() {
            if student_id != uid {
                return Err(SyncError::StudentMismatch);
            }
        }
    }

    let duration_min = if booking.duration_min > 0 {
        booking.duration_min
    } else {
        DEFAULT_DURATION_MIN
    };
    let open = booking.start_time_ms - JOIN_GRACE_MS;
    let close = booking.start_time_ms + duration_min * 60_000 + JOIN_GRACE_MS;
    if now_ms < open || now_ms > close {
        return Err(SyncError::SessionNotLive);
    }

    Ok(())
}
