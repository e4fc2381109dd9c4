//! Rule specificity ordering and environment filtering

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::rule::{Criterion, StoredRule};

/// Snapshot of the environment rules are matched against
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub application: Option<String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_application(mut self, application: impl Into<String>) -> Self {
        self.application = Some(application.into());
        self
    }

    pub fn value(&self, criterion: Criterion) -> Option<&str> {
        match criterion {
            Criterion::User => self.user.as_deref(),
            Criterion::Theme => self.theme.as_deref(),
            Criterion::Locale => self.locale.as_deref(),
            Criterion::Application => self.application.as_deref(),
        }
    }
}

/// Specificity comparer for two rules targeting the same module id
///
/// Ascending order means less specific first, so a left-to-right merge
/// lets the most specific rule win:
/// 1. priority
/// 2. presence of `user`, `theme`, `locale`, `application`, in that order
/// 3. ordinal (insertion order)
pub fn compare_rules(a: &StoredRule, b: &StoredRule) -> Ordering {
    a.priority()
        .cmp(&b.priority())
        .then_with(|| {
            Criterion::SPECIFICITY_ORDER
                .iter()
                .map(|&c| a.criterion(c).is_some().cmp(&b.criterion(c).is_some()))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.ordinal.cmp(&b.ordinal))
}

/// Rule filter bound to one environment
#[derive(Debug, Clone, Copy)]
pub struct RuleFilter<'a> {
    environment: &'a Environment,
}

impl<'a> RuleFilter<'a> {
    pub fn new(environment: &'a Environment) -> Self {
        Self { environment }
    }

    /// A rule passes iff every criterion it defines accepts the
    /// environment's value. Undefined criteria always pass.
    pub fn matches(&self, rule: &StoredRule) -> bool {
        Criterion::FILTER_ORDER.iter().all(|&c| match rule.criterion(c) {
            None => true,
            Some(expected) => self
                .environment
                .value(c)
                .is_some_and(|actual| expected.matches(actual)),
        })
    }
}
