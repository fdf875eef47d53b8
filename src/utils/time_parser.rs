//! 时长解析
//!
//! 支持相对时长格式：30d、720h、1d12h、90m、45s、2w，以及组合格式 1d2h30m

use std::time::Duration;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;

/// 解析时长字符串
pub fn parse_interval(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("时长不能为空".to_string());
    }

    let mut total_secs: u64 = 0;
    let mut remaining = input;

    while !remaining.is_empty() {
        // 提取数字
        let digits = remaining
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(remaining.len());
        if digits == 0 {
            return Err(format!("无效的时长格式: '{}'", input));
        }

        let num: u64 = remaining[..digits]
            .parse()
            .map_err(|_| format!("无效的数字: '{}'", &remaining[..digits]))?;
        remaining = &remaining[digits..];

        // 提取单位
        let unit_len = remaining
            .find(|c: char| !c.is_alphabetic())
            .unwrap_or(remaining.len());
        if unit_len == 0 {
            return Err(format!("缺少时间单位，数字 '{}' 后应跟时间单位", num));
        }

        let unit = &remaining[..unit_len];
        let scale = match unit.to_lowercase().as_str() {
            "s" | "sec" | "second" | "seconds" => 1,
            "m" | "min" | "minute" | "minutes" => MINUTE,
            "h" | "hour" | "hours" => HOUR,
            "d" | "day" | "days" => DAY,
            "w" | "week" | "weeks" => WEEK,
            _ => return Err(format!("不支持的时间单位: '{}'", unit)),
        };

        total_secs = num
            .checked_mul(scale)
            .and_then(|secs| total_secs.checked_add(secs))
            .ok_or_else(|| format!("时长超出有效范围: '{}'", input))?;
        remaining = &remaining[unit_len..];
    }

    if total_secs == 0 {
        return Err("时间间隔不能为零".to_string());
    }

    Ok(Duration::from_secs(total_secs))
}

/// 格式化时长，如 30d、1d12h、45m
pub fn format_interval(interval: Duration) -> String {
    let secs = interval.as_secs();
    let days = secs / DAY;
    let hours = (secs % DAY) / HOUR;
    let minutes = (secs % HOUR) / MINUTE;
    let seconds = secs % MINUTE;

    let mut out = String::new();
    for (value, unit) in [(days, "d"), (hours, "h"), (minutes, "m"), (seconds, "s")] {
        if value > 0 {
            out.push_str(&format!("{}{}", value, unit));
        }
    }

    if out.is_empty() {
        "0s".to_string()
    } else {
        out
    }
}
