//! Static rules - the `StaticRule` interface and the regex rule table

use regex::Regex;

use super::finding::{Finding, Language, ScanCategory};
use crate::results::Severity;

/// A check over one source file's text
pub trait StaticRule: Send + Sync {
    fn id(&self) -> &'static str;

    /// Categories this rule can report
    fn categories(&self) -> &[ScanCategory];

    fn applies_to(&self, language: Language) -> bool;

    fn matches(&self, source: &str) -> Vec<Finding>;
}

const PY: &[Language] = &[Language::Python];
const JS: &[Language] = &[Language::JavaScript];
const ANY: &[Language] = &[Language::Python, Language::JavaScript];

const AVOID_SHELL: &str = "Avoid shell string concatenation; pass an argument list \
                           (subprocess.run([...]) / execFile) and never build commands from input";
const PARAMETERIZE: &str = "Use parameterized queries instead of building SQL strings from input";
const NO_DYNAMIC_EVAL: &str = "Do not evaluate dynamically built code; parse data with a safe parser";
const CONFINE_PATHS: &str = "Resolve the path and reject it unless it stays inside an allowed base directory";
const USE_SECRET_STORE: &str = "Load secrets from the environment or a secret manager, never from source";
const STRONG_CRYPTO: &str = "Use SHA-256 or stronger and keep TLS certificate verification enabled";
const SAFE_DESERIALIZE: &str = "Validate untrusted input and use safe loaders (json, yaml.safe_load)";
const CONSTANT_TIME: &str = "Compare credentials with a constant-time function against a stored hash \
                             (hmac.compare_digest / crypto.timingSafeEqual)";

/// (id, category, pattern, severity, languages, recommendation, cwe)
type PatternRow = (
    &'static str,
    ScanCategory,
    &'static str,
    Severity,
    &'static [Language],
    &'static str,
    &'static str,
);

const PATTERNS: &[PatternRow] = &[
    // Command injection
    (
        "CMD-001",
        ScanCategory::CommandInjection,
        r"os\.system\s*\([^)]*\+",
        Severity::Critical,
        PY,
        AVOID_SHELL,
        "CWE-78",
    ),
    (
        "CMD-002",
        ScanCategory::CommandInjection,
        r#"os\.system\s*\(\s*f["']"#,
        Severity::Critical,
        PY,
        AVOID_SHELL,
        "CWE-78",
    ),
    (
        "CMD-003",
        ScanCategory::CommandInjection,
        r"subprocess\.\w+\s*\([^)]*shell\s*=\s*True",
        Severity::High,
        PY,
        AVOID_SHELL,
        "CWE-78",
    ),
    (
        "CMD-004",
        ScanCategory::CommandInjection,
        r"os\.popen\s*\(",
        Severity::High,
        PY,
        AVOID_SHELL,
        "CWE-78",
    ),
    (
        "CMD-005",
        ScanCategory::CommandInjection,
        r"\bexec(?:Sync)?\s*\([^)]*(?:\+|\$\{)",
        Severity::Critical,
        JS,
        AVOID_SHELL,
        "CWE-78",
    ),
    // Code injection; Python builtins are covered by the syntax tree rule
    (
        "CODE-001",
        ScanCategory::CodeInjection,
        r"\beval\s*\(",
        Severity::Critical,
        JS,
        NO_DYNAMIC_EVAL,
        "CWE-95",
    ),
    (
        "CODE-002",
        ScanCategory::CodeInjection,
        r"\bnew\s+Function\s*\(",
        Severity::High,
        JS,
        NO_DYNAMIC_EVAL,
        "CWE-95",
    ),
    // SQL injection
    (
        "SQL-001",
        ScanCategory::SqlInjection,
        r#"(?i)\b(?:execute|executemany|query|raw)\s*\(\s*f?["'`][^"'`]*\b(?:select|insert|update|delete)\b[^)]*(?:\+|%\s|\.format\(|\$\{|\{[a-z_])"#,
        Severity::High,
        ANY,
        PARAMETERIZE,
        "CWE-89",
    ),
    // Path traversal
    (
        "PATH-001",
        ScanCategory::PathTraversal,
        r#"\bopen\s*\(\s*(?:f["']|[^)]*\+)"#,
        Severity::Medium,
        PY,
        CONFINE_PATHS,
        "CWE-22",
    ),
    (
        "PATH-002",
        ScanCategory::PathTraversal,
        r"\b(?:readFile|readFileSync|createReadStream|writeFile|writeFileSync)\s*\([^)]*(?:\+|\$\{)",
        Severity::Medium,
        JS,
        CONFINE_PATHS,
        "CWE-22",
    ),
    // Hardcoded secrets
    (
        "SECRET-001",
        ScanCategory::HardcodedSecrets,
        r#"(?i)\b(?:api[_-]?key|secret(?:[_-]?key)?|password|passwd|access[_-]?token|auth[_-]?token)\b\s*[:=]\s*["'][^"'\s]{8,}["']"#,
        Severity::High,
        ANY,
        USE_SECRET_STORE,
        "CWE-798",
    ),
    (
        "SECRET-002",
        ScanCategory::HardcodedSecrets,
        r"\bAKIA[0-9A-Z]{16}\b",
        Severity::Critical,
        ANY,
        USE_SECRET_STORE,
        "CWE-798",
    ),
    (
        "SECRET-003",
        ScanCategory::HardcodedSecrets,
        r"-----BEGIN (?:RSA |EC |OPENSSH )?PRIVATE KEY-----",
        Severity::Critical,
        ANY,
        USE_SECRET_STORE,
        "CWE-798",
    ),
    // Weak crypto
    (
        "CRYPTO-001",
        ScanCategory::WeakCrypto,
        r"hashlib\.(?:md5|sha1)\s*\(",
        Severity::Medium,
        PY,
        STRONG_CRYPTO,
        "CWE-327",
    ),
    (
        "CRYPTO-002",
        ScanCategory::WeakCrypto,
        r#"createHash\s*\(\s*["'](?:md5|sha1)["']"#,
        Severity::Medium,
        JS,
        STRONG_CRYPTO,
        "CWE-327",
    ),
    (
        "CRYPTO-003",
        ScanCategory::WeakCrypto,
        r"\bverify\s*=\s*False\b|ssl\._create_unverified_context|rejectUnauthorized\s*:\s*false",
        Severity::Medium,
        ANY,
        STRONG_CRYPTO,
        "CWE-295",
    ),
    // Unchecked input
    (
        "INPUT-001",
        ScanCategory::UncheckedInput,
        r"\bpickle\.loads?\s*\(",
        Severity::High,
        PY,
        SAFE_DESERIALIZE,
        "CWE-502",
    ),
    (
        "INPUT-002",
        ScanCategory::UncheckedInput,
        r"\byaml\.(?:unsafe_load|load)\s*\(\s*[\w.]+\s*\)",
        Severity::Medium,
        PY,
        SAFE_DESERIALIZE,
        "CWE-502",
    ),
    (
        "INPUT-003",
        ScanCategory::UncheckedInput,
        r"\.innerHTML\s*=",
        Severity::Medium,
        JS,
        SAFE_DESERIALIZE,
        "CWE-79",
    ),
    // Naive auth
    (
        "AUTH-001",
        ScanCategory::NaiveAuth,
        r"(?i)\b(?:password|passwd|token|secret|api_key)\w*\s*===?\s*\S",
        Severity::Medium,
        ANY,
        CONSTANT_TIME,
        "CWE-208",
    ),
    (
        "AUTH-002",
        ScanCategory::NaiveAuth,
        r#"(?i)algorithms?\s*[=:]\s*\[?\s*["']none["']"#,
        Severity::High,
        ANY,
        CONSTANT_TIME,
        "CWE-347",
    ),
];

/// A regex over raw source text
pub struct RegexRule {
    id: &'static str,
    category: [ScanCategory; 1],
    regex: Regex,
    severity: Severity,
    languages: &'static [Language],
    recommendation: &'static str,
    cwe: &'static str,
}

impl RegexRule {
    pub fn new(
        id: &'static str,
        category: ScanCategory,
        pattern: &str,
        severity: Severity,
        languages: &'static [Language],
        recommendation: &'static str,
        cwe: &'static str,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            id,
            category: [category],
            regex: Regex::new(pattern)?,
            severity,
            languages,
            recommendation,
            cwe,
        })
    }

    pub fn category(&self) -> ScanCategory {
        self.category[0]
    }
}

impl StaticRule for RegexRule {
    fn id(&self) -> &'static str {
        self.id
    }

    fn categories(&self) -> &[ScanCategory] {
        &self.category
    }

    fn applies_to(&self, language: Language) -> bool {
        self.languages.contains(&language)
    }

    fn matches(&self, source: &str) -> Vec<Finding> {
        let lines = LineIndex::new(source);
        self.regex
            .find_iter(source)
            .map(|m| {
                let line = lines.line_of(m.start());
                Finding {
                    rule: self.id,
                    category: self.category(),
                    severity: self.severity,
                    line,
                    matched: m.as_str().to_string(),
                    snippet: lines.snippet(source, line),
                    recommendation: self.recommendation,
                    cwe: Some(self.cwe),
                }
            })
            .collect()
    }
}

/// The built-in regex rule table
pub fn builtin_regex_rules() -> Vec<RegexRule> {
    PATTERNS
        .iter()
        .filter_map(|&(id, category, pattern, severity, languages, recommendation, cwe)| {
            match RegexRule::new(id, category, pattern, severity, languages, recommendation, cwe) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    tracing::warn!("Skipping rule {}: {}", id, e);
                    None
                }
            }
        })
        .collect()
}

/// Byte offset to line lookup
pub(crate) struct LineIndex {
    starts: Vec<usize>,
}

const SNIPPET_MAX: usize = 200;

impl LineIndex {
    pub(crate) fn new(source: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { starts }
    }

    /// 1-based line containing `offset`
    pub(crate) fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }

    /// Trimmed text of 1-based `line`
    pub(crate) fn snippet(&self, source: &str, line: usize) -> String {
        let start = self.starts.get(line - 1).copied().unwrap_or(0);
        let end = self
            .starts
            .get(line)
            .map(|next| next - 1)
            .unwrap_or(source.len());
        let text = source.get(start..end).unwrap_or_default().trim();
        if text.chars().count() > SNIPPET_MAX {
            let cut: String = text.chars().take(SNIPPET_MAX).collect();
            format!("{}...", cut)
        } else {
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(language: Language, source: &str) -> Vec<Finding> {
        builtin_regex_rules()
            .iter()
            .filter(|r| r.applies_to(language))
            .flat_map(|r| r.matches(source))
            .collect()
    }

    #[test]
    fn every_pattern_compiles() {
        assert_eq!(builtin_regex_rules().len(), PATTERNS.len());
    }

    #[test]
    fn os_system_concatenation_is_one_critical_finding() {
        let findings = run(Language::Python, r#"os.system("rm -rf " + user_input)"#);
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.category, ScanCategory::CommandInjection);
        assert_eq!(f.severity, Severity::Critical);
        assert!(f.recommendation.contains("Avoid shell string concatenation"));
    }

    #[test]
    fn python_eval_left_to_tree_rule() {
        assert!(run(Language::Python, "result = eval(expr)").is_empty());
        let js = run(Language::JavaScript, "const r = eval(expr);");
        assert_eq!(js.len(), 1);
        assert_eq!(js[0].category, ScanCategory::CodeInjection);
    }

    #[test]
    fn detects_each_category() {
        let source = r#"
cursor.execute(f"SELECT * FROM users WHERE id = {user_id}")
data = open(f"/srv/{name}").read()
API_KEY = "sk_live_abcdefghijklmnop"
h = hashlib.md5(data)
obj = pickle.loads(blob)
if password == supplied:
    pass
"#;
        let categories: Vec<ScanCategory> =
            run(Language::Python, source).iter().map(|f| f.category).collect();
        for expected in [
            ScanCategory::SqlInjection,
            ScanCategory::PathTraversal,
            ScanCategory::HardcodedSecrets,
            ScanCategory::WeakCrypto,
            ScanCategory::UncheckedInput,
            ScanCategory::NaiveAuth,
        ] {
            assert!(categories.contains(&expected), "missing {}", expected);
        }
    }

    #[test]
    fn clean_source_has_no_findings() {
        let source = r#"
import json

def handle(request):
    payload = json.loads(request)
    return {"ok": True, "count": len(payload)}
"#;
        assert!(run(Language::Python, source).is_empty());
    }

    #[test]
    fn line_numbers_and_snippets() {
        let source = "a = 1\n\n  os.popen(cmd)\n";
        let findings = run(Language::Python, source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 3);
        assert_eq!(findings[0].snippet, "os.popen(cmd)");
    }

    #[test]
    fn line_index_boundaries() {
        let index = LineIndex::new("ab\ncd\n");
        assert_eq!(index.line_of(0), 1);
        assert_eq!(index.line_of(2), 1);
        assert_eq!(index.line_of(3), 2);
        assert_eq!(index.snippet("ab\ncd\n", 2), "cd");
    }
}
