//! Python syntax-tree rule
//!
//! Flags calls to the dynamic-evaluation builtins and imports of modules that
//! execute or deserialize arbitrary input. Working on the tree rather than raw
//! text keeps strings and comments from matching.

use tree_sitter::{Language as Grammar, Node, Parser};

use super::finding::{Finding, Language, ScanCategory};
use super::rules::{LineIndex, StaticRule};
use crate::errors::{HarnessError, Result};
use crate::results::Severity;

const DYNAMIC_EVAL: &[&str] = &["eval", "exec", "compile", "__import__"];

const DANGEROUS_MODULES: &[&str] = &["pickle", "marshal", "shelve", "subprocess", "ctypes", "telnetlib"];

const EVAL_RECOMMENDATION: &str =
    "Do not evaluate dynamically built code; use ast.literal_eval or an explicit dispatch table";
const IMPORT_RECOMMENDATION: &str =
    "Confirm this module never receives untrusted input; prefer json or an argument-list subprocess call";

pub struct PythonTreeRule {
    grammar: Grammar,
}

impl PythonTreeRule {
    pub fn new() -> Result<Self> {
        let grammar: Grammar = tree_sitter_python::LANGUAGE.into();
        // Fail at construction rather than per file if the grammar ABI is incompatible
        Parser::new()
            .set_language(&grammar)
            .map_err(|e| HarnessError::scan("tree-sitter-python", e.to_string()))?;
        Ok(Self { grammar })
    }

    fn inspect(&self, node: Node<'_>, source: &str, lines: &LineIndex, out: &mut Vec<Finding>) {
        match node.kind() {
            "call" => {
                let Some(function) = node.child_by_field_name("function") else {
                    return;
                };
                if let Some(name) = called_builtin(function, source) {
                    if DYNAMIC_EVAL.contains(&name) {
                        out.push(self.finding(
                            node,
                            source,
                            lines,
                            ScanCategory::CodeInjection,
                            Severity::Critical,
                        ));
                    }
                }
            }
            "import_statement" => {
                let mut cursor = node.walk();
                for name in node.children_by_field_name("name", &mut cursor) {
                    let module = match name.kind() {
                        "aliased_import" => name.child_by_field_name("name"),
                        _ => Some(name),
                    };
                    if module.is_some_and(|m| is_dangerous_module(m, source)) {
                        out.push(self.finding(
                            node,
                            source,
                            lines,
                            ScanCategory::DangerousImport,
                            Severity::Medium,
                        ));
                        break;
                    }
                }
            }
            "import_from_statement" => {
                if node
                    .child_by_field_name("module_name")
                    .is_some_and(|m| is_dangerous_module(m, source))
                {
                    out.push(self.finding(
                        node,
                        source,
                        lines,
                        ScanCategory::DangerousImport,
                        Severity::Medium,
                    ));
                }
            }
            _ => {}
        }
    }

    fn finding(
        &self,
        node: Node<'_>,
        source: &str,
        lines: &LineIndex,
        category: ScanCategory,
        severity: Severity,
    ) -> Finding {
        let line = node.start_position().row + 1;
        let (rule, recommendation, cwe) = match category {
            ScanCategory::CodeInjection => ("PY-EVAL", EVAL_RECOMMENDATION, "CWE-95"),
            _ => ("PY-IMPORT", IMPORT_RECOMMENDATION, "CWE-676"),
        };
        Finding {
            rule,
            category,
            severity,
            line,
            matched: node.utf8_text(source.as_bytes()).unwrap_or_default().to_string(),
            snippet: lines.snippet(source, line),
            recommendation,
            cwe: Some(cwe),
        }
    }
}

/// `eval(...)` or `builtins.eval(...)`
fn called_builtin<'s>(function: Node<'_>, source: &'s str) -> Option<&'s str> {
    let bytes = source.as_bytes();
    match function.kind() {
        "identifier" => function.utf8_text(bytes).ok(),
        "attribute" => {
            let object = function.child_by_field_name("object")?;
            if object.utf8_text(bytes).ok()? != "builtins" {
                return None;
            }
            function.child_by_field_name("attribute")?.utf8_text(bytes).ok()
        }
        _ => None,
    }
}

fn is_dangerous_module(module: Node<'_>, source: &str) -> bool {
    module
        .utf8_text(source.as_bytes())
        .ok()
        .and_then(|name| name.split('.').next())
        .is_some_and(|root| DANGEROUS_MODULES.contains(&root))
}

impl StaticRule for PythonTreeRule {
    fn id(&self) -> &'static str {
        "PY-TREE"
    }

    fn categories(&self) -> &[ScanCategory] {
        &[ScanCategory::CodeInjection, ScanCategory::DangerousImport]
    }

    fn applies_to(&self, language: Language) -> bool {
        language == Language::Python
    }

    fn matches(&self, source: &str) -> Vec<Finding> {
        let mut parser = Parser::new();
        if parser.set_language(&self.grammar).is_err() {
            return Vec::new();
        }
        let Some(tree) = parser.parse(source, None) else {
            tracing::warn!("tree-sitter returned no tree");
            return Vec::new();
        };

        let lines = LineIndex::new(source);
        let mut findings = Vec::new();
        let mut cursor = tree.walk();
        loop {
            self.inspect(cursor.node(), source, &lines, &mut findings);
            if cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return findings;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<Finding> {
        PythonTreeRule::new().unwrap().matches(source)
    }

    #[test]
    fn flags_dynamic_evaluation_builtins() {
        let source = "x = eval(data)\nexec(code)\nc = compile(src, 'f', 'exec')\nm = __import__(name)\n";
        let findings = scan(source);
        assert_eq!(findings.len(), 4);
        assert!(findings
            .iter()
            .all(|f| f.category == ScanCategory::CodeInjection && f.severity == Severity::Critical));
        let lines: Vec<usize> = findings.iter().map(|f| f.line).collect();
        assert_eq!(lines, vec![1, 2, 3, 4]);
        assert_eq!(findings[0].matched, "eval(data)");
    }

    #[test]
    fn strings_and_comments_do_not_match() {
        let source = "# eval(x) is dangerous\nmsg = \"never call exec(code)\"\nliteral_eval(x)\n";
        assert!(scan(source).is_empty());
    }

    #[test]
    fn builtins_attribute_call() {
        let findings = scan("import builtins\nbuiltins.eval(x)\n");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 2);
    }

    #[test]
    fn flags_dangerous_imports() {
        let source = "import os\nimport pickle as p\nfrom subprocess import run\nimport json, marshal\n";
        let findings = scan(source);
        let lines: Vec<usize> = findings.iter().map(|f| f.line).collect();
        assert_eq!(lines, vec![2, 3, 4]);
        assert!(findings
            .iter()
            .all(|f| f.category == ScanCategory::DangerousImport));
    }

    #[test]
    fn tolerates_syntax_errors() {
        let findings = scan("def broken(:\n    eval(x)\n");
        assert!(findings.len() <= 1);
    }
}
