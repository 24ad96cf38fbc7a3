/// Status narration: prints a local timestamp followed by the message.
/// Given a starting time first, it also prints how long it took from then to now.
/// ```
/// # use harvest::info_time;
/// let stage_start = chrono::Local::now();
/// let url = "http://mag.test/category/issues/page/1";
/// info_time!("Found {} issue links on {url}", 12);
/// info_time!(stage_start, "Finished stage {}", "issue links");
/// ```
#[macro_export]
macro_rules! info_time {
    ($strfm:literal $(,)? $($arg:expr),*) => {{
        let local_now = ::chrono::Local::now();
        let res = format!("{:<30} : {}", local_now, format!($strfm, $($arg),*));
        println!("{}", res);
    }};
    ($time:expr, $strfm:literal $(,)? $($arg:expr),*) => {{
        let local_now = ::chrono::Local::now();
        let run_time = (local_now - $time)
                .num_microseconds()
                .map(|n| n as f64 / 1_000_000.0)
                .unwrap_or(0.0);
        let res = format!("{:<30} : {}\nRUNTIME: {} sec", local_now, format!($strfm, $($arg),*), run_time);
        println!("{}", res);
    }};
}

/// Same as `info_time!` but goes to stderr, for items that failed and were set aside.
/// ```
/// # use harvest::warn_time;
/// warn_time!("Failed to retrieve and process story {}: {}", "/fiction/x", "connection reset");
/// ```
#[macro_export]
macro_rules! warn_time {
    ($strfm:literal $(,)? $($arg:expr),*) => {{
        let local_now = ::chrono::Local::now();
        eprintln!("{:<30} : WARN {}", local_now, format!($strfm, $($arg),*));
    }};
}
