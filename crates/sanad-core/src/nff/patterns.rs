//! Numeric and financial pattern rules.
//!
//! Each rule matches a factual shape that must be grounded: money amounts,
//! percentages, growth multiples, market sizing, revenue metrics, user
//! counts and dated periods.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// (rule name, pattern), in reporting order.
    pub static ref NUMERIC_RULES: Vec<(&'static str, Regex)> = vec![
        ("currency_amount", Regex::new(
            r"(?i)(?:[$€£¥]\s?\d[\d,]*(?:\.\d+)?(?:\s?(?:k|mm|m|bn|b|million|billion|thousand)\b)?|\b\d[\d,]*(?:\.\d+)?\s?(?:usd|eur|gbp|dollars)\b)"
        ).unwrap()),
        ("percentage", Regex::new(
            r"(?i)\b\d+(?:\.\d+)?\s?(?:%|percent\b|pct\b)"
        ).unwrap()),
        ("growth_multiple", Regex::new(
            r"(?i)\b(?:\d+(?:\.\d+)?\s?x|doubled|tripled|quadrupled)\b"
        ).unwrap()),
        ("market_size", Regex::new(
            r"(?i)\b(?:tam|sam|som|total addressable market|serviceable (?:addressable|obtainable) market|market size)\b"
        ).unwrap()),
        ("revenue_metric", Regex::new(
            r"(?i)\b(?:arr|mrr|revenue|bookings|gmv|ebitda|net income|burn(?: rate)?|runway)\b[^.;\n\d]{0,40}\d[\d,]*(?:\.\d+)?(?:%|\s?(?:k|mm|m|bn|b|million|billion|thousand|x)\b)?"
        ).unwrap()),
        ("user_count", Regex::new(
            r"(?i)\b\d[\d,]*(?:\.\d+)?\s?(?:k|m|million|thousand)?\+?\s+(?:active\s+)?(?:users|customers|subscribers|clients|employees|downloads|merchants|accounts)\b"
        ).unwrap()),
        ("dated_period", Regex::new(
            r"(?i)\b(?:(?:q[1-4]|h[12]|fy)\s?'?\d{2,4}|(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:tember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\s+\d{4}|(?:in|since|by|during)\s+(?:19|20)\d{2})\b"
        ).unwrap()),
    ];
}
