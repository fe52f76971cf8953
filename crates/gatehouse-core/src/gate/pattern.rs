//! 경로 패턴 매칭.
//!
//! 지원 형식: 리터럴 세그먼트, `*` (세그먼트 하나), 마지막 위치의 `**` (0개 이상의 세그먼트).

use std::fmt;

/// 잘못된 경로 패턴.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("잘못된 경로 패턴 '{pattern}': {message}")]
pub struct PatternError {
    pub pattern: String,
    pub message: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Wildcard,
}

/// 컴파일된 경로 패턴.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
    /// 끝이 `**`인지
    tail: bool,
}

/// 패턴 구체성. 큰 값이 더 구체적입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity {
    literals: usize,
    exact: bool,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let raw = pattern.trim();
        let error = |message| PatternError {
            pattern: raw.to_string(),
            message,
        };

        if !raw.starts_with('/') {
            return Err(error("'/'로 시작해야 합니다"));
        }

        let parts: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(parts.len());
        let mut tail = false;

        for (i, part) in parts.iter().enumerate() {
            match *part {
                "**" if i + 1 == parts.len() => tail = true,
                "**" => return Err(error("'**'는 마지막 세그먼트에만 올 수 있습니다")),
                "*" => segments.push(Segment::Wildcard),
                "." | ".." => return Err(error("'.'/'..' 세그먼트는 사용할 수 없습니다")),
                p if p.contains('*') => {
                    return Err(error("와일드카드는 세그먼트 전체여야 합니다"))
                }
                p => segments.push(Segment::Literal(p.to_string())),
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
            tail,
        })
    }

    /// 리터럴 세그먼트로만 구성된 패턴.
    pub(crate) fn literal(segments: &[&str], tail: bool) -> Self {
        let mut raw: String = segments.iter().map(|s| format!("/{}", s)).collect();
        if tail {
            raw.push_str("/**");
        }

        Self {
            raw,
            segments: segments
                .iter()
                .map(|s| Segment::Literal(s.to_string()))
                .collect(),
            tail,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// 정규화된 경로 세그먼트와 매칭.
    ///
    /// `/x/**`는 `/x` 자체에도 매칭됩니다.
    pub fn matches(&self, path: &[&str]) -> bool {
        let length_ok = if self.tail {
            path.len() >= self.segments.len()
        } else {
            path.len() == self.segments.len()
        };

        length_ok
            && self.segments.iter().zip(path).all(|(seg, part)| match seg {
                Segment::Literal(lit) => lit == part,
                Segment::Wildcard => true,
            })
    }

    pub fn specificity(&self) -> Specificity {
        let literals = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count();

        Specificity {
            literals,
            exact: !self.tail && literals == self.segments.len(),
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// 요청 경로 정규화.
///
/// 빈 세그먼트와 `.`을 제거하고 `..`은 상위 세그먼트를 제거합니다 (루트 위로는 올라가지 않음).
pub fn normalize_path(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            p => segments.push(p),
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, path: &str) -> bool {
        PathPattern::parse(pattern)
            .unwrap()
            .matches(&normalize_path(path))
    }

    #[test]
    fn test_literal_match() {
        assert!(matches("/api/resources/me", "/api/resources/me"));
        assert!(matches("/api/resources/me", "/api/resources/me/"));
        assert!(!matches("/api/resources/me", "/api/resources/me/x"));
        assert!(!matches("/api/resources/me", "/api/resources"));
    }

    #[test]
    fn test_double_wildcard() {
        assert!(matches("/api/auth/**", "/api/auth"));
        assert!(matches("/api/auth/**", "/api/auth/login"));
        assert!(matches("/api/auth/**", "/api/auth/a/b/c"));
        assert!(!matches("/api/auth/**", "/api/authx"));
    }

    #[test]
    fn test_single_wildcard() {
        assert!(matches("/api/*/users", "/api/admin/users"));
        assert!(!matches("/api/*/users", "/api/users"));
    }

    #[test]
    fn test_normalize_dot_segments() {
        assert_eq!(
            normalize_path("/api/auth/../resources/admin"),
            vec!["api", "resources", "admin"]
        );
        assert_eq!(normalize_path("//api/./x//"), vec!["api", "x"]);
        assert_eq!(normalize_path("/../../api"), vec!["api"]);
        assert!(normalize_path("/").is_empty());
    }

    #[test]
    fn test_dot_segments_cannot_escape_to_public_rule() {
        assert!(!matches("/api/auth/**", "/api/auth/../resources/admin"));
    }

    #[test]
    fn test_specificity_ordering() {
        let spec = |p: &str| PathPattern::parse(p).unwrap().specificity();

        assert!(spec("/api/resources/admin/**") > spec("/api/**"));
        assert!(spec("/api/resources/admin") > spec("/api/resources/admin/**"));
        assert!(spec("/api/resources/user") > spec("/api/resources/*"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(PathPattern::parse("api/x").is_err());
        assert!(PathPattern::parse("/api/**/x").is_err());
        assert!(PathPattern::parse("/api/ab*").is_err());
        assert!(PathPattern::parse("/api/../x").is_err());
    }
}
