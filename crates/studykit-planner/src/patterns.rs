use chrono::{Duration, Timelike};
use studykit_numeric::{exponential_moving_average, k_means, mean};

use studykit_core::{SessionRecord, UserRecord};

/// Duration buckets are 30 minutes wide, up to 4 hours.
const BUCKET_MINUTES: u32 = 30;
const MAX_BUCKETS: usize = 8;

/// Minimum sessions before the k-means window detection is attempted.
const MIN_SESSIONS_FOR_CLUSTERING: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct DurationBucket {
    pub lo_minutes: u32,
    pub hi_minutes: u32,
    pub mean_quality: f64,
    pub count: usize,
}

/// Per-user study habits mined directly from session history, independent of
/// any trained model. Recomputed fresh on every request.
#[derive(Debug, Clone)]
pub struct StudyPatterns {
    /// Mean session quality per local start hour; 0.0 where unobserved.
    pub hourly_performance: [f64; 24],
    pub hourly_counts: [usize; 24],
    pub duration_buckets: Vec<DurationBucket>,
    /// Latest value of the quality EMA over sessions in time order.
    pub productivity_trend: f64,
    /// Overall mean quality, for trend comparison.
    pub mean_quality: f64,
    /// Centre of the strongest (hour, quality) cluster, when enough sessions
    /// exist to cluster at all.
    pub peak_window_hour: Option<u8>,
}

impl StudyPatterns {
    pub fn mine(user: &UserRecord, sessions: &[SessionRecord], ema_alpha: f64) -> Self {
        let mut own: Vec<&SessionRecord> =
            sessions.iter().filter(|s| s.user_id == user.id).collect();
        own.sort_by_key(|s| s.started_at);

        let mut hour_sum = [0.0f64; 24];
        let mut hourly_counts = [0usize; 24];
        let mut bucket_sum = [0.0f64; MAX_BUCKETS];
        let mut bucket_count = [0usize; MAX_BUCKETS];

        for s in &own {
            let local = s.started_at + Duration::minutes(user.timezone_offset_minutes as i64);
            let hour = local.hour() as usize;
            hour_sum[hour] += s.quality();
            hourly_counts[hour] += 1;

            let bucket =
                ((s.duration_minutes / BUCKET_MINUTES) as usize).min(MAX_BUCKETS - 1);
            bucket_sum[bucket] += s.quality();
            bucket_count[bucket] += 1;
        }

        let mut hourly_performance = [0.0f64; 24];
        for h in 0..24 {
            if hourly_counts[h] > 0 {
                hourly_performance[h] = hour_sum[h] / hourly_counts[h] as f64;
            }
        }

        let duration_buckets: Vec<DurationBucket> = (0..MAX_BUCKETS)
            .filter(|&b| bucket_count[b] > 0)
            .map(|b| DurationBucket {
                lo_minutes: b as u32 * BUCKET_MINUTES,
                hi_minutes: (b as u32 + 1) * BUCKET_MINUTES,
                mean_quality: bucket_sum[b] / bucket_count[b] as f64,
                count: bucket_count[b],
            })
            .collect();

        let qualities: Vec<f64> = own.iter().map(|s| s.quality()).collect();
        let ema = exponential_moving_average(&qualities, ema_alpha);
        let productivity_trend = ema.last().copied().unwrap_or(0.0);
        let mean_quality = mean(&qualities);

        let peak_window_hour = detect_peak_window(user, &own);

        StudyPatterns {
            hourly_performance,
            hourly_counts,
            duration_buckets,
            productivity_trend,
            mean_quality,
            peak_window_hour,
        }
    }

    /// Best-performing start hour with at least `min_count` observations.
    pub fn best_hour(&self, min_count: usize) -> Option<u8> {
        (0..24)
            .filter(|&h| self.hourly_counts[h] >= min_count)
            .max_by(|&a, &b| {
                self.hourly_performance[a]
                    .partial_cmp(&self.hourly_performance[b])
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|h| h as u8)
    }

    /// Midpoint of the best-performing duration bucket.
    pub fn best_duration(&self, min_count: usize) -> Option<u32> {
        self.duration_buckets
            .iter()
            .filter(|b| b.count >= min_count)
            .max_by(|a, b| {
                a.mean_quality
                    .partial_cmp(&b.mean_quality)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|b| (b.lo_minutes + b.hi_minutes) / 2)
    }
}

/// Cluster (start hour, quality) points and return the hour at the centre of
/// the highest-quality cluster. Catches sparse histories where no single
/// hour repeats often enough for `best_hour`.
fn detect_peak_window(user: &UserRecord, sessions: &[&SessionRecord]) -> Option<u8> {
    if sessions.len() < MIN_SESSIONS_FOR_CLUSTERING {
        return None;
    }
    let points: Vec<Vec<f64>> = sessions
        .iter()
        .map(|s| {
            let local = s.started_at + Duration::minutes(user.timezone_offset_minutes as i64);
            vec![local.hour() as f64 / 23.0, s.quality()]
        })
        .collect();

    let k = (sessions.len() / 4).clamp(2, 3);
    let result = k_means(&points, k, 50, Some(17)).ok()?;

    result
        .centroids
        .iter()
        .max_by(|a, b| a[1].partial_cmp(&b[1]).unwrap_or(std::cmp::Ordering::Equal))
        .map(|c| (c[0] * 23.0).round().clamp(0.0, 23.0) as u8)
}
