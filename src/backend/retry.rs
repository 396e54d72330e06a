use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

pub(crate) const RATE_LIMIT_MAX_RETRIES: usize = 3;
pub(crate) const RATE_LIMIT_BASE_DELAY: Duration = Duration::from_secs(1);
pub(crate) const RATE_LIMIT_MAX_DELAY: Duration = Duration::from_secs(30);

pub(crate) fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
        return true;
    }
    let lower = body.to_lowercase();
    lower.contains("rate limit") || lower.contains("too many requests")
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after")?.to_str().ok()?.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    None
}

pub(crate) async fn wait_with_backoff(
    operation: &str,
    attempt: usize,
    delay: Duration,
    retry_after: Option<Duration>,
) -> Duration {
    let mut wait = delay;
    if let Some(retry_after) = retry_after
        && retry_after > wait
    {
        wait = retry_after;
    }
    warn!(
        "{} rate limited; retrying in {:.1}s (attempt {}/{})",
        operation,
        wait.as_secs_f32(),
        attempt,
        RATE_LIMIT_MAX_RETRIES
    );
    sleep(wait).await;
    next_delay(delay)
}

pub(crate) fn next_delay(current: Duration) -> Duration {
    let next_secs = current
        .as_secs()
        .saturating_mul(2)
        .max(RATE_LIMIT_BASE_DELAY.as_secs());
    let next = Duration::from_secs(next_secs);
    if next > RATE_LIMIT_MAX_DELAY {
        RATE_LIMIT_MAX_DELAY
    } else {
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_statuses_are_retryable() {
        assert!(is_rate_limited(StatusCode::TOO_MANY_REQUESTS, ""));
        assert!(is_rate_limited(StatusCode::SERVICE_UNAVAILABLE, ""));
        assert!(is_rate_limited(
            StatusCode::BAD_REQUEST,
            "Rate limit exceeded for this plan"
        ));
        assert!(!is_rate_limited(StatusCode::UNAUTHORIZED, "bad credentials"));
    }

    #[test]
    fn delay_doubles_up_to_the_cap() {
        let first = next_delay(RATE_LIMIT_BASE_DELAY);
        assert_eq!(first, Duration::from_secs(2));
        assert_eq!(next_delay(Duration::from_secs(20)), RATE_LIMIT_MAX_DELAY);
    }

    #[test]
    fn retry_after_parses_whole_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", "7".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));
        headers.insert("retry-after", "soon".parse().unwrap());
        assert_eq!(retry_after(&headers), None);
    }
}
