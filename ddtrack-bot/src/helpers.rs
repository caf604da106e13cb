use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Score reported for players without a finish time on race servers.
const UNFINISHED_SCORE: i64 = -9999;

pub fn now() -> i64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_secs() as i64)
    .unwrap_or_default()
}

/// "**A** is playing", "**A** and **B** are playing", "**A**, **B** and **C** are playing".
pub fn player_sentence(names: &[&str]) -> String {
  match names {
    [] => String::new(),
    [one] => format!("**{}** is playing", one),
    [init @ .., last] => {
      let init: Vec<String> = init.iter().map(|n| format!("**{}**", n)).collect();
      format!("{} and **{}** are playing", init.join(", "), last)
    }
  }
}

/// Regional indicator flag for a location like `"eu:de"` or `"de"`.
pub fn country_flag(location: Option<&str>) -> String {
  const WHITE_FLAG: &str = "🏳️";
  let Some(location) = location else {
    return WHITE_FLAG.to_string();
  };
  let code = location.rsplit(':').next().unwrap_or(location);
  if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
    return WHITE_FLAG.to_string();
  }
  code
    .to_ascii_uppercase()
    .chars()
    .filter_map(|c| char::from_u32(c as u32 + 127397))
    .collect()
}

/// Finish time from a race score, or `None` when the player has not finished.
pub fn format_finish_time(score: i64) -> Option<String> {
  if score == 0 || score == UNFINISHED_SCORE {
    return None;
  }
  let total = score.unsigned_abs();
  let hours = total / 3600;
  let minutes = (total % 3600) / 60;
  let seconds = total % 60;
  if hours > 0 {
    Some(format!("{}:{:02}:{:02}", hours, minutes, seconds))
  } else {
    Some(format!("{}:{:02}", minutes, seconds))
  }
}

/// Plain `ip:port` to connect to, preferring an IPv4 address.
///
/// Master server addresses look like `tw-0.6+udp://1.2.3.4:8303`.
pub fn connect_address(addresses: &[String]) -> String {
  let strip = |addr: &str| -> String {
    addr
      .split_once("://")
      .map(|(_, rest)| rest)
      .unwrap_or(addr)
      .to_string()
  };
  addresses
    .iter()
    .map(|a| strip(a))
    .find(|a| matches!(a.parse::<SocketAddr>(), Ok(SocketAddr::V4(_))))
    .or_else(|| addresses.first().map(|a| strip(a)))
    .unwrap_or_default()
}
