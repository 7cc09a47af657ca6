//! Route-level access rules.
//!
//! Rules are evaluated in declared order and the first match decides. A
//! request that matches no rule must be authenticated.
//!
//! Pattern syntax (segments are separated by `/`, empty segments ignored):
//! - `users`   literal segment
//! - `*`       exactly one segment (`{name}` is accepted as an alias)
//! - `*.png`   one segment matching a glob
//! - `**`      any number of segments, including none
//!
//! Rule text: `[METHOD] PATTERN DECISION`, entries separated by `;` or newline.
//! Decisions: `permitAll`, `requireAuthenticated`, `requireRole:NAME`.

use std::fmt;

use axum::http::Method;
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::extractors::SecurityContext;
use crate::services::auth::{failure::AuthFailure, identity_resolver::normalize_role};

/// Rules of the source application, plus `/health` and the admin area.
///
/// The admin rule comes first so the static asset globs cannot open
/// `/api/admin/**` paths that happen to end in `.js` or `.png`.
pub const DEFAULT_RULES: &str = "
    /api/admin/**       requireRole:ADMIN
    /                   permitAll
    /favicon.ico        permitAll
    /**/*.png           permitAll
    /**/*.gif           permitAll
    /**/*.svg           permitAll
    /**/*.jpg           permitAll
    /**/*.html          permitAll
    /**/*.css           permitAll
    /**/*.js            permitAll
    /health             permitAll
    /api/auth/**        permitAll
    /api/user/checkUsernameAvailability permitAll
    /api/user/checkEmailAvailability    permitAll
    GET /api/polls/**   permitAll
    GET /api/users/**   permitAll
";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("rule {index}: expected `[METHOD] PATTERN DECISION`, got `{entry}`")]
    Syntax { index: usize, entry: String },
    #[error("rule {index}: unsupported method `{method}`")]
    Method { index: usize, method: String },
    #[error("rule {index}: invalid pattern `{pattern}`: {reason}")]
    Pattern {
        index: usize,
        pattern: String,
        reason: &'static str,
    },
    #[error("rule {index}: unknown decision `{decision}`")]
    Decision { index: usize, decision: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    PermitAll,
    RequireAuthenticated,
    RequireRole(String),
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::PermitAll => f.write_str("permitAll"),
            Access::RequireAuthenticated => f.write_str("requireAuthenticated"),
            Access::RequireRole(role) => write!(f, "requireRole:{role}"),
        }
    }
}

impl Access {
    // Anything `other` would reject, `self` rejects too.
    fn at_least_as_strict_as(&self, other: &Access) -> bool {
        match (self, other) {
            (a, b) if a == b => true,
            (_, Access::PermitAll) => true,
            (Access::RequireRole(_), Access::RequireAuthenticated) => true,
            _ => false,
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "permitAll" => Some(Self::PermitAll),
            "requireAuthenticated" | "authenticated" => Some(Self::RequireAuthenticated),
            _ => {
                let role = normalize_role(raw.strip_prefix("requireRole:")?);
                (!role.is_empty()).then_some(Self::RequireRole(role))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Reject(AuthFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Any,
    Glob(String),
    Deep,
}

impl Segment {
    fn matches(&self, segment: &str) -> bool {
        match self {
            Segment::Literal(lit) => lit == segment,
            Segment::Any => true,
            Segment::Glob(glob) => glob_match(glob, segment),
            Segment::Deep => true,
        }
    }

    // Some single path segment matches both. `Deep` is handled by the caller.
    fn overlaps(&self, other: &Segment) -> bool {
        match (self, other) {
            (Segment::Any, _) | (_, Segment::Any) => true,
            (Segment::Literal(lit), other) | (other, Segment::Literal(lit)) => {
                other.matches(lit)
            }
            (Segment::Glob(a), Segment::Glob(b)) => {
                let a: Vec<char> = a.chars().collect();
                let b: Vec<char> = b.chars().collect();
                globs_overlap(&a, &b)
            }
            (Segment::Deep, _) | (_, Segment::Deep) => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self, &'static str> {
        if !raw.starts_with('/') {
            return Err("must start with '/'");
        }

        let mut segments = Vec::new();
        for part in raw.split('/').filter(|s| !s.is_empty()) {
            let segment = match part {
                "**" => Segment::Deep,
                "*" => Segment::Any,
                _ if part.starts_with('{') && part.ends_with('}') => {
                    if part.len() <= 2 {
                        return Err("empty path variable");
                    }
                    Segment::Any
                }
                _ if part.contains("**") => return Err("'**' must be a whole segment"),
                _ if part.contains('*') => Segment::Glob(part.to_string()),
                _ => Segment::Literal(part.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match_segments(&self.segments, &parts)
    }

    /// True when at least one path matches both patterns.
    pub fn overlaps(&self, other: &PathPattern) -> bool {
        patterns_overlap(&self.segments, &other.segments)
    }
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::Deep, rest)) => (0..=path.len()).any(|i| match_segments(rest, &path[i..])),
        Some((segment, rest)) => match path.split_first() {
            Some((head, tail)) => segment.matches(head) && match_segments(rest, tail),
            None => false,
        },
    }
}

fn patterns_overlap(a: &[Segment], b: &[Segment]) -> bool {
    match (a.split_first(), b.split_first()) {
        (None, None) => true,
        // `**` matches nothing, or swallows one more segment of the other side
        (Some((Segment::Deep, a_rest)), _) => {
            patterns_overlap(a_rest, b) || (!b.is_empty() && patterns_overlap(a, &b[1..]))
        }
        (_, Some((Segment::Deep, b_rest))) => {
            patterns_overlap(a, b_rest) || (!a.is_empty() && patterns_overlap(&a[1..], b))
        }
        (Some((x, a_rest)), Some((y, b_rest))) => {
            x.overlaps(y) && patterns_overlap(a_rest, b_rest)
        }
        _ => false,
    }
}

// Same recursion one level down: `*` against characters of the other glob.
fn globs_overlap(a: &[char], b: &[char]) -> bool {
    match (a.split_first(), b.split_first()) {
        (None, None) => true,
        (Some(('*', a_rest)), _) => {
            globs_overlap(a_rest, b) || (!b.is_empty() && globs_overlap(a, &b[1..]))
        }
        (_, Some(('*', b_rest))) => {
            globs_overlap(a, b_rest) || (!a.is_empty() && globs_overlap(&a[1..], b))
        }
        (Some((x, a_rest)), Some((y, b_rest))) => x == y && globs_overlap(a_rest, b_rest),
        _ => false,
    }
}

/// `*` matches any run of characters inside a single segment.
fn glob_match(glob: &str, text: &str) -> bool {
    let g: Vec<char> = glob.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut gi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if gi < g.len() && g[gi] == '*' {
            star = Some((gi, ti));
            gi += 1;
        } else if gi < g.len() && g[gi] == t[ti] {
            gi += 1;
            ti += 1;
        } else if let Some((sg, st)) = star {
            gi = sg + 1;
            ti = st + 1;
            star = Some((sg, st + 1));
        } else {
            return false;
        }
    }
    g[gi..].iter().all(|c| *c == '*')
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    method: Option<Method>,
    pattern: PathPattern,
    access: Access,
}

impl Rule {
    pub fn new(method: Option<Method>, pattern: PathPattern, access: Access) -> Self {
        Self {
            method,
            pattern,
            access,
        }
    }

    pub fn access(&self) -> &Access {
        &self.access
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.as_ref().is_none_or(|m| m == method) && self.pattern.matches(path)
    }

    /// True when some request matches both rules.
    pub fn overlaps(&self, other: &Rule) -> bool {
        let methods_meet = match (&self.method, &other.method) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        methods_meet && self.pattern.overlaps(&other.pattern)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(method) = &self.method {
            write!(f, "{method} ")?;
        }
        write!(f, "{} {}", self.pattern.as_str(), self.access)
    }
}

/// Ordered, immutable rule list shared by all requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn defaults() -> Result<Self, RuleError> {
        Self::parse(DEFAULT_RULES)
    }

    pub fn parse(text: &str) -> Result<Self, RuleError> {
        let mut rules = Vec::new();

        for (index, entry) in text
            .split([';', '\n'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .enumerate()
        {
            let tokens: Vec<&str> = entry.split_whitespace().collect();
            let (method, pattern, decision) = match tokens.as_slice() {
                [pattern, decision] => (None, *pattern, *decision),
                [method, pattern, decision] => (Some(*method), *pattern, *decision),
                _ => {
                    return Err(RuleError::Syntax {
                        index,
                        entry: entry.to_string(),
                    });
                }
            };

            let method = method
                .map(|m| {
                    parse_method(m).ok_or_else(|| RuleError::Method {
                        index,
                        method: m.to_string(),
                    })
                })
                .transpose()?;

            let pattern = PathPattern::parse(pattern).map_err(|reason| RuleError::Pattern {
                index,
                pattern: pattern.to_string(),
                reason,
            })?;

            let access = Access::parse(decision).ok_or_else(|| RuleError::Decision {
                index,
                decision: decision.to_string(),
            })?;

            rules.push(Rule::new(method, pattern, access));
        }

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn matching_rule(&self, method: &Method, path: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.matches(method, path))
    }

    pub fn authorize(&self, method: &Method, path: &str, ctx: &SecurityContext) -> Decision {
        let access = self
            .matching_rule(method, path)
            .map(Rule::access)
            .unwrap_or(&Access::RequireAuthenticated);

        match access {
            Access::PermitAll => Decision::Allow,
            Access::RequireAuthenticated => match ctx.principal() {
                Some(_) => Decision::Allow,
                None => Decision::Reject(ctx.failure_reason()),
            },
            Access::RequireRole(role) => match ctx.principal() {
                Some(p) if p.has_role(role) => Decision::Allow,
                Some(_) => Decision::Reject(AuthFailure::InsufficientRole),
                None => Decision::Reject(ctx.failure_reason()),
            },
        }
    }

    /// Pairs `(earlier, later)` where some request matches both rules and the
    /// decisions differ. First match wins, so for those requests the later rule
    /// never applies, whether it covers them fully or only partly.
    pub fn shadowed(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for (j, later) in self.rules.iter().enumerate() {
            for (i, earlier) in self.rules[..j].iter().enumerate() {
                if earlier.access != later.access && earlier.overlaps(later) {
                    out.push((i, j));
                }
            }
        }
        out
    }

    /// The subset of [`RuleSet::shadowed`] where the earlier rule is weaker,
    /// i.e. requests the later rule would reject get through.
    pub fn loosened(&self) -> Vec<(usize, usize)> {
        self.shadowed()
            .into_iter()
            .filter(|&(i, j)| {
                !self.rules[i]
                    .access
                    .at_least_as_strict_as(&self.rules[j].access)
            })
            .collect()
    }

    pub fn warn_shadowed(&self) {
        for (i, j) in self.shadowed() {
            let (earlier, later) = (&self.rules[i], &self.rules[j]);
            if earlier.access.at_least_as_strict_as(&later.access) {
                debug!(%earlier, %later, "access rule is narrowed by a stricter earlier rule");
            } else {
                warn!(
                    %earlier,
                    %later,
                    "access rule is shadowed by a weaker earlier rule (first match wins)"
                );
            }
        }
    }
}

fn parse_method(raw: &str) -> Option<Method> {
    match raw.to_ascii_uppercase().as_str() {
        "GET" => Some(Method::GET),
        "POST" => Some(Method::POST),
        "PUT" => Some(Method::PUT),
        "PATCH" => Some(Method::PATCH),
        "DELETE" => Some(Method::DELETE),
        "HEAD" => Some(Method::HEAD),
        "OPTIONS" => Some(Method::OPTIONS),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::principal::Principal;

    fn pattern(raw: &str) -> PathPattern {
        PathPattern::parse(raw).unwrap()
    }

    fn anonymous() -> SecurityContext {
        SecurityContext::default()
    }

    fn user(roles: &[&str]) -> SecurityContext {
        SecurityContext::authenticated(Principal::new(
            "alice",
            roles.iter().map(|r| r.to_string()).collect(),
        ))
    }

    #[test]
    fn exact_and_single_segment_wildcards() {
        assert!(pattern("/api/users").matches("/api/users"));
        assert!(pattern("/api/users").matches("/api/users/"));
        assert!(!pattern("/api/users").matches("/api/users/alice"));

        assert!(pattern("/api/users/*").matches("/api/users/alice"));
        assert!(!pattern("/api/users/*").matches("/api/users"));
        assert!(!pattern("/api/users/*").matches("/api/users/alice/orders"));

        assert!(pattern("/api/users/{id}/orders").matches("/api/users/42/orders"));
        assert!(pattern("/").matches("/"));
        assert!(!pattern("/").matches("/index.html"));
    }

    #[test]
    fn multi_segment_wildcards() {
        let p = pattern("/api/public/**");
        assert!(p.matches("/api/public"));
        assert!(p.matches("/api/public/a"));
        assert!(p.matches("/api/public/a/b/c"));
        assert!(!p.matches("/api/publicity"));
        assert!(!p.matches("/api"));

        let p = pattern("/**/*.png");
        assert!(p.matches("/logo.png"));
        assert!(p.matches("/static/img/logo.png"));
        assert!(!p.matches("/static/img/logo.png/raw"));
        assert!(!p.matches("/static/logo.jpg"));
    }

    #[test]
    fn glob_inside_segment() {
        assert!(glob_match("*.png", "a.png"));
        assert!(glob_match("*.png", ".png"));
        assert!(glob_match("a*b*c", "aXXbYYc"));
        assert!(!glob_match("a*b*c", "aXXbYY"));
        assert!(glob_match("*", ""));
    }

    #[test]
    fn invalid_patterns_are_rejected() {
        assert!(PathPattern::parse("api/users").is_err());
        assert!(PathPattern::parse("/api/x**").is_err());
        assert!(PathPattern::parse("/api/{}").is_err());
    }

    #[test]
    fn parse_rule_text() {
        let rules = RuleSet::parse(
            "GET /api/users/** permitAll; /api/admin/** requireRole:ROLE_ADMIN\n/api/** authenticated",
        )
        .unwrap();

        assert_eq!(rules.rules().len(), 3);
        assert_eq!(rules.rules()[0].to_string(), "GET /api/users/** permitAll");
        assert_eq!(
            rules.rules()[1].access(),
            &Access::RequireRole("ADMIN".into())
        );
        assert_eq!(rules.rules()[2].access(), &Access::RequireAuthenticated);
    }

    #[test]
    fn parse_errors_name_the_entry() {
        assert!(matches!(
            RuleSet::parse("/a"),
            Err(RuleError::Syntax { index: 0, .. })
        ));
        assert!(matches!(
            RuleSet::parse("/a permitAll; FETCH /b permitAll"),
            Err(RuleError::Method { index: 1, .. })
        ));
        assert!(matches!(
            RuleSet::parse("/a allowEveryone"),
            Err(RuleError::Decision { .. })
        ));
        assert!(matches!(
            RuleSet::parse("/a requireRole:"),
            Err(RuleError::Decision { .. })
        ));
        assert!(matches!(
            RuleSet::parse("a permitAll"),
            Err(RuleError::Pattern { .. })
        ));
    }

    #[test]
    fn permit_all_allows_regardless_of_context() {
        let rules = RuleSet::parse("/api/auth/** permitAll").unwrap();
        for ctx in [
            anonymous(),
            SecurityContext::unauthenticated(AuthFailure::InvalidSignature),
            user(&["USER"]),
        ] {
            assert_eq!(
                rules.authorize(&Method::POST, "/api/auth/signin", &ctx),
                Decision::Allow
            );
        }
    }

    #[test]
    fn unmatched_requests_require_authentication() {
        let rules = RuleSet::default();
        assert_eq!(
            rules.authorize(&Method::GET, "/anything", &anonymous()),
            Decision::Reject(AuthFailure::MissingToken)
        );
        assert_eq!(
            rules.authorize(
                &Method::GET,
                "/anything",
                &SecurityContext::unauthenticated(AuthFailure::ExpiredToken)
            ),
            Decision::Reject(AuthFailure::ExpiredToken)
        );
        assert_eq!(
            rules.authorize(&Method::GET, "/anything", &user(&["USER"])),
            Decision::Allow
        );
    }

    #[test]
    fn method_constraint_limits_rule() {
        let rules = RuleSet::parse("GET /api/users/** permitAll").unwrap();
        assert_eq!(
            rules.authorize(&Method::GET, "/api/users/alice", &anonymous()),
            Decision::Allow
        );
        assert_eq!(
            rules.authorize(&Method::DELETE, "/api/users/alice", &anonymous()),
            Decision::Reject(AuthFailure::MissingToken)
        );
    }

    #[test]
    fn role_rules_distinguish_401_and_403() {
        let rules = RuleSet::parse("/api/admin/** requireRole:ADMIN").unwrap();
        assert_eq!(
            rules.authorize(&Method::GET, "/api/admin/ping", &anonymous()),
            Decision::Reject(AuthFailure::MissingToken)
        );
        assert_eq!(
            rules.authorize(&Method::GET, "/api/admin/ping", &user(&["USER"])),
            Decision::Reject(AuthFailure::InsufficientRole)
        );
        assert_eq!(
            rules.authorize(&Method::GET, "/api/admin/ping", &user(&["USER", "ADMIN"])),
            Decision::Allow
        );
    }

    #[test]
    fn first_match_wins_even_when_broader() {
        let rules = RuleSet::parse(
            "/api/public/** permitAll; /api/public/admin requireAuthenticated",
        )
        .unwrap();

        assert_eq!(
            rules.authorize(&Method::GET, "/api/public/admin", &anonymous()),
            Decision::Allow
        );
        assert_eq!(rules.shadowed(), vec![(0, 1)]);
    }

    #[test]
    fn specific_before_broad_only_narrows() {
        let rules = RuleSet::parse(
            "/api/public/admin requireAuthenticated; /api/public/** permitAll",
        )
        .unwrap();

        assert_eq!(
            rules.authorize(&Method::GET, "/api/public/admin", &anonymous()),
            Decision::Reject(AuthFailure::MissingToken)
        );
        assert_eq!(rules.shadowed(), vec![(0, 1)]);
        assert!(rules.loosened().is_empty());
    }

    #[test]
    fn partial_overlap_is_reported() {
        // only the `.js` paths under /api/admin are taken by the earlier rule
        let rules =
            RuleSet::parse("/**/*.js permitAll; /api/admin/** requireRole:ADMIN").unwrap();

        assert_eq!(
            rules.authorize(&Method::GET, "/api/admin/export.js", &user(&["USER"])),
            Decision::Allow
        );
        assert_eq!(
            rules.authorize(&Method::GET, "/api/admin/export", &user(&["USER"])),
            Decision::Reject(AuthFailure::InsufficientRole)
        );
        assert_eq!(rules.shadowed(), vec![(0, 1)]);
        assert_eq!(rules.loosened(), vec![(0, 1)]);
    }

    #[test]
    fn shadowing_respects_method_constraints() {
        let rules = RuleSet::parse(
            "GET /api/users/** permitAll; /api/users/admin requireAuthenticated",
        )
        .unwrap();
        // GET requests to /api/users/admin are taken by the first rule
        assert_eq!(rules.loosened(), vec![(0, 1)]);

        let rules = RuleSet::parse(
            "GET /api/users/** permitAll; POST /api/users/admin requireAuthenticated",
        )
        .unwrap();
        assert!(rules.shadowed().is_empty());
    }

    #[test]
    fn pattern_overlap() {
        let overlaps = |a: &str, b: &str| pattern(a).overlaps(&pattern(b));

        assert!(overlaps("/**", "/anything/at/all"));
        assert!(overlaps("/**/*.png", "/api/admin/**"));
        assert!(overlaps("/api/*/orders", "/api/alice/*"));
        assert!(overlaps("/**/a/**", "/x/**/a"));
        assert!(overlaps("/files/*.tar.*", "/files/*.gz"));
        assert!(overlaps("/api/users/**", "/api/users"));

        assert!(!overlaps("/api/users/**", "/api/polls/**"));
        assert!(!overlaps("/**/*.png", "/**/*.jpg"));
        assert!(!overlaps("/api/*", "/api/a/b"));
        assert!(!overlaps("/", "/favicon.ico"));
        assert!(!overlaps("/a*", "/b*"));
    }

    #[test]
    fn default_rules_parse_and_cover_source_routes() {
        let rules = RuleSet::defaults().unwrap();
        let anon = anonymous();

        for (method, path) in [
            (Method::GET, "/"),
            (Method::GET, "/favicon.ico"),
            (Method::GET, "/static/js/main.js"),
            (Method::GET, "/health"),
            (Method::POST, "/api/auth/signin"),
            (Method::GET, "/api/user/checkUsernameAvailability"),
            (Method::GET, "/api/polls/12"),
            (Method::GET, "/api/users/alice"),
        ] {
            assert_eq!(
                rules.authorize(&method, path, &anon),
                Decision::Allow,
                "{method} {path}"
            );
        }

        for (method, path) in [
            (Method::POST, "/api/polls"),
            (Method::GET, "/api/user/me"),
            (Method::GET, "/api/orders/alice"),
            (Method::GET, "/api/admin/ping"),
            (Method::GET, "/api/admin/export.js"),
        ] {
            assert_eq!(
                rules.authorize(&method, path, &anon),
                Decision::Reject(AuthFailure::MissingToken),
                "{method} {path}"
            );
        }
        assert_eq!(
            rules.authorize(&Method::GET, "/api/admin/app.js", &user(&["USER"])),
            Decision::Reject(AuthFailure::InsufficientRole)
        );

        // asset globs overlap the admin area, but the admin rule comes first
        assert!(!rules.shadowed().is_empty());
        assert!(rules.shadowed().iter().all(|&(i, _)| i == 0));
        assert!(rules.loosened().is_empty());
    }
}
