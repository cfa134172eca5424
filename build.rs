//! Stamps `PCC_BUILD_DATE` and `PCC_BUILD_TIME` for `pcc info`.
//!
//! The stamp is `SOURCE_DATE_EPOCH` when set, so reproducible builds get a
//! fixed value, and the current UTC time otherwise. Either variable can also be
//! set directly to override its half of the stamp.

use time::OffsetDateTime;

const STAMP_FORMAT: &str = "[month repr:short] [day padding:space] [year]|[hour]:[minute]:[second]";

fn build_instant() -> OffsetDateTime {
    std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|secs| secs.trim().parse::<i64>().ok())
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .unwrap_or_else(OffsetDateTime::now_utc)
}

fn main() {
    let stamp = time::format_description::parse(STAMP_FORMAT)
        .ok()
        .and_then(|fmt| build_instant().format(&fmt).ok())
        .unwrap_or_else(|| "unknown|unknown".to_string());
    let (date, time) = stamp.split_once('|').unwrap_or((stamp.as_str(), "unknown"));

    for (key, value) in [("PCC_BUILD_DATE", date), ("PCC_BUILD_TIME", time)] {
        let value = std::env::var(key).unwrap_or_else(|_| value.to_string());
        println!("cargo:rerun-if-env-changed={}", key);
        println!("cargo:rustc-env={}={}", key, value);
    }
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
}
