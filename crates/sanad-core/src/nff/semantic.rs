//! Subject-predicate rules for factual statements without numeric shape.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// (rule name, pattern), in reporting order.
    pub static ref SEMANTIC_RULES: Vec<(&'static str, Regex)> = vec![
        ("company_achievement", Regex::new(
            r"(?i)\b(?:the company|company|the startup|the business|we|it)\s+(?:has\s+|have\s+)?(?:achieved|reached|surpassed|exceeded|hit|crossed|generated)\b"
        ).unwrap()),
        ("revenue_change", Regex::new(
            r"(?i)\b(?:revenue|revenues|arr|mrr|sales|bookings)\s+(?:has\s+|have\s+)?(?:grew|grown|increased|decreased|declined|doubled|tripled|rose|fell|dropped|jumped)\b"
        ).unwrap()),
        ("funding_event", Regex::new(
            r"(?i)\b(?:raised|closed|secured)\s+(?:a\s+|an\s+|its\s+)?(?:pre-seed|seed|series\s+[a-f]|bridge|funding|round)\b"
        ).unwrap()),
        ("margin_state", Regex::new(
            r"(?i)\b(?:gross|net|operating|contribution|ebitda)\s+margins?\s+(?:is|are|was|were|of|at|stands\s+at|improved|expanded|declined|compressed)\b"
        ).unwrap()),
        ("market_size", Regex::new(
            r"(?i)\bmarket\s+(?:is|was|will\s+be)\s+(?:worth|valued|estimated|projected|expected)\b"
        ).unwrap()),
        ("team_growth", Regex::new(
            r"(?i)\b(?:team|headcount|workforce|staff)\s+(?:has\s+)?(?:grew|grown|doubled|tripled|expanded|increased|reached)\b"
        ).unwrap()),
        ("founder_background", Regex::new(
            r"(?i)\b(?:founders?|co-founders?|ceo|cto)\s+(?:previously\s+)?(?:was|were|worked|founded|led|built|sold|exited|holds?|spent)\b"
        ).unwrap()),
        ("customer_growth", Regex::new(
            r"(?i)\b(?:(?:customers?|users?|clients?|subscribers?)\s+(?:base\s+)?(?:has\s+|have\s+)?(?:grew|grown|doubled|tripled|increased|reached)|(?:signed|onboarded|acquired)\s+(?:new\s+)?(?:customers|clients|users|logos))\b"
        ).unwrap()),
        ("valuation_claim", Regex::new(
            r"(?i)\b(?:valued\s+at|valuation\s+(?:of|is|was)|post-money|pre-money)\b"
        ).unwrap()),
        ("founding_date", Regex::new(
            r"(?i)\b(?:founded|established|incorporated)\s+(?:in|on)\s+(?:[a-z]+\s+)?(?:19|20)\d{2}\b"
        ).unwrap()),
        ("competitive_claim", Regex::new(
            r"(?i)\b(?:market\s+leader|leading\s+provider|first[- ]mover|only\s+(?:company|platform|provider)|no\s+(?:direct\s+)?competitors?|outperforms?\s+(?:all\s+)?(?:competitors|incumbents|rivals))\b"
        ).unwrap()),
        ("unit_economics", Regex::new(
            r"(?i)\b(?:cac|ltv|ltv/cac|ltv:cac|payback(?:\s+period)?|churn(?:\s+rate)?|net\s+revenue\s+retention|nrr|arpu|acv)\s+(?:is|was|of|at|stands\s+at|below|above|under)\b"
        ).unwrap()),
    ];
}
