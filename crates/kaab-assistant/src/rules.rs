//! Static keyword classification.
//!
//! Rules are data: each category carries one keyword list per locale, and a
//! message matches when its lowercased text contains any keyword from any
//! locale. Adding a locale means adding a list, not a branch.

use kaab_core::traits::EntityKind;

/// Keyword lists for one intent, grouped by locale.
#[derive(Debug)]
pub struct KeywordSet {
    locales: &'static [(&'static str, &'static [&'static str])],
}

impl KeywordSet {
    /// Build from `(locale, keywords)` pairs. Keywords must be lowercase.
    pub const fn new(locales: &'static [(&'static str, &'static [&'static str])]) -> Self {
        Self { locales }
    }

    /// Whether `lowered` contains any keyword of any locale.
    pub fn matches(&self, lowered: &str) -> bool {
        self.locales
            .iter()
            .flat_map(|(_, words)| words.iter())
            .any(|word| lowered.contains(word))
    }
}

/// One answerable entity category.
#[derive(Debug)]
pub struct CategoryRule {
    /// Entity kind queried from the store.
    pub kind: EntityKind,
    /// URL path segment of the listing page.
    pub slug: &'static str,
    /// Trigger keywords.
    pub keywords: KeywordSet,
}

/// The complete rule table.
#[derive(Debug)]
pub struct Rules {
    /// "Tell me about ..." intent.
    pub about: KeywordSet,
    /// Names of the platform itself.
    pub platform: KeywordSet,
    /// Entity categories in priority order.
    pub categories: &'static [CategoryRule],
    /// "How many" intent.
    pub count: KeywordSet,
    /// "Which categories" intent.
    pub listing: KeywordSet,
}

/// Built-in English and Arabic rules.
pub static RULES: Rules = Rules {
    about: KeywordSet::new(&[
        ("en", &["about", "what is", "what's", "who are", "tell me", "explain"]),
        ("ar", &["ما هو", "ما هي", "ماهو", "عن ", "من انتم", "من أنتم", "عرفني"]),
    ]),
    platform: KeywordSet::new(&[
        ("en", &["kaabhub", "kaab hub", "kaab", "this platform", "this site", "this website"]),
        ("ar", &["كعب", "المنصة", "هذه المنصة", "الموقع"]),
    ]),
    categories: &[
        CategoryRule {
            kind: EntityKind::Opportunity,
            slug: "opportunities",
            keywords: KeywordSet::new(&[
                ("en", &["opportunit", "scholarship", "internship", "job", "vacanc"]),
                ("ar", &["فرص", "فرصة", "منحة", "منح", "تدريب", "وظيف"]),
            ]),
        },
        CategoryRule {
            kind: EntityKind::Mentorship,
            slug: "mentorships",
            keywords: KeywordSet::new(&[
                ("en", &["mentor"]),
                ("ar", &["إرشاد", "ارشاد", "مرشد", "توجيه"]),
            ]),
        },
        CategoryRule {
            kind: EntityKind::Post,
            slug: "posts",
            keywords: KeywordSet::new(&[
                ("en", &["post", "article"]),
                ("ar", &["منشور", "مقال"]),
            ]),
        },
        CategoryRule {
            kind: EntityKind::Question,
            slug: "questions",
            keywords: KeywordSet::new(&[
                ("en", &["question"]),
                ("ar", &["سؤال", "أسئلة", "اسئلة"]),
            ]),
        },
    ],
    count: KeywordSet::new(&[
        ("en", &["how many", "count", "number of", "total"]),
        ("ar", &["كم", "عدد"]),
    ]),
    listing: KeywordSet::new(&[
        ("en", &["categor", "type", "kinds", "fields", "topics"]),
        ("ar", &["فئات", "تصنيف", "أنواع", "انواع", "مجالات"]),
    ]),
};

/// What to do with an entity category match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityAction {
    /// Report how many items exist.
    Count,
    /// List the distinct category tags.
    ListCategories,
    /// Point at the listing page.
    Browse,
}

/// Result of classifying one message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    /// Question about the platform itself.
    About,
    /// Question answerable from entity data.
    Entity {
        /// Matched category.
        rule: &'static CategoryRule,
        /// Inner action.
        action: EntityAction,
    },
    /// Nothing matched; ask the model.
    Delegate,
}

impl PartialEq for CategoryRule {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for CategoryRule {}

impl Rules {
    /// Classify `text`. First match wins: about, then categories in order.
    ///
    /// `site_name` is treated as an extra platform keyword.
    pub fn classify(&'static self, text: &str, site_name: &str) -> Intent {
        let lowered = text.to_lowercase();

        if self.about.matches(&lowered) && self.mentions_platform(&lowered, site_name) {
            return Intent::About;
        }

        for rule in self.categories {
            if rule.keywords.matches(&lowered) {
                let action = if self.count.matches(&lowered) {
                    EntityAction::Count
                } else if self.listing.matches(&lowered) {
                    EntityAction::ListCategories
                } else {
                    EntityAction::Browse
                };
                return Intent::Entity { rule, action };
            }
        }

        Intent::Delegate
    }

    fn mentions_platform(&self, lowered: &str, site_name: &str) -> bool {
        let site = site_name.trim().to_lowercase();
        (!site.is_empty() && lowered.contains(&site)) || self.platform.matches(lowered)
    }
}
