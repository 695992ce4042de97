//! Answer wording.
//!
//! Replies follow the script of the question: Arabic questions get Arabic
//! answers, everything else gets English.

use kaab_core::traits::{EntityKind, EntityRecord};

/// Response language.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lang {
    /// English.
    En,
    /// Arabic.
    Ar,
}

impl Lang {
    /// Arabic if `text` contains any Arabic-script letter.
    pub fn detect(text: &str) -> Self {
        if text.chars().any(|c| ('\u{0600}'..='\u{06FF}').contains(&c)) {
            Self::Ar
        } else {
            Self::En
        }
    }
}

/// Navigation link for a listing page.
pub fn link(site_base_url: &str, slug: &str) -> String {
    format!("{}/{slug}", site_base_url.trim_end_matches('/'))
}

/// Distinct non-empty category tags, in first-seen order.
pub fn distinct_categories(records: &[EntityRecord]) -> Vec<String> {
    let mut seen = Vec::<String>::new();
    for tag in records
        .iter()
        .filter_map(|r| r.category.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        if !seen.iter().any(|s| s == tag) {
            seen.push(tag.to_string());
        }
    }
    seen
}

/// Fixed description of the platform.
pub fn about(site_name: &str, lang: Lang) -> String {
    match lang {
        Lang::En => format!(
            "{site_name} is a community platform for students and graduates. \
             You can discover scholarships, internships and jobs, connect with mentors, \
             share posts with the community and ask or answer questions."
        ),
        Lang::Ar => format!(
            "{site_name} منصة مجتمعية للطلاب والخريجين. \
             يمكنك اكتشاف المنح والتدريب والوظائف، والتواصل مع المرشدين، \
             ومشاركة المنشورات وطرح الأسئلة والإجابة عليها."
        ),
    }
}

fn plural(kind: EntityKind, lang: Lang) -> &'static str {
    match (kind, lang) {
        (EntityKind::Opportunity, Lang::En) => "opportunities",
        (EntityKind::Mentorship, Lang::En) => "mentorships",
        (EntityKind::Post, Lang::En) => "posts",
        (EntityKind::Question, Lang::En) => "questions",
        (EntityKind::Opportunity, Lang::Ar) => "الفرص",
        (EntityKind::Mentorship, Lang::Ar) => "برامج الإرشاد",
        (EntityKind::Post, Lang::Ar) => "المنشورات",
        (EntityKind::Question, Lang::Ar) => "الأسئلة",
    }
}

/// "There are N items" with a link.
pub fn count(kind: EntityKind, n: usize, link: &str, lang: Lang) -> String {
    let what = plural(kind, lang);
    match lang {
        Lang::En => format!("There are currently {n} {what} available. You can browse them here: {link}"),
        Lang::Ar => format!("يوجد حاليًا {n} من {what}. يمكنك تصفحها هنا: {link}"),
    }
}

/// Distinct category tags with a link, or a "none" sentence.
pub fn categories(kind: EntityKind, tags: &[String], link: &str, lang: Lang) -> String {
    let what = plural(kind, lang);
    match (lang, tags.is_empty()) {
        (Lang::En, true) => format!("There are no {what} categories available right now. You can browse all {what} here: {link}"),
        (Lang::En, false) => format!("Available {what} categories: {}. Browse them here: {link}", tags.join(", ")),
        (Lang::Ar, true) => format!("لا توجد فئات متاحة من {what} حاليًا. يمكنك تصفح جميع {what} هنا: {link}"),
        (Lang::Ar, false) => format!("فئات {what} المتاحة: {}. تصفحها هنا: {link}", tags.join("، ")),
    }
}

/// Generic pointer to the listing page.
pub fn browse(kind: EntityKind, link: &str, lang: Lang) -> String {
    let what = plural(kind, lang);
    match lang {
        Lang::En => format!("You can browse all {what} here: {link}"),
        Lang::Ar => format!("يمكنك تصفح جميع {what} هنا: {link}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_joins_without_double_slash() {
        assert_eq!(link("", "posts"), "/posts");
        assert_eq!(link("https://kaabhub.com/", "posts"), "https://kaabhub.com/posts");
    }

    #[test]
    fn distinct_categories_skip_empty_and_duplicates() {
        let records = vec![
            EntityRecord::tagged("scholarship"),
            EntityRecord::tagged(" "),
            EntityRecord::untagged(),
            EntityRecord::tagged("internship"),
            EntityRecord::tagged("scholarship"),
        ];
        assert_eq!(distinct_categories(&records), ["scholarship", "internship"]);
    }

    #[test]
    fn language_detection() {
        assert_eq!(Lang::detect("How many posts?"), Lang::En);
        assert_eq!(Lang::detect("كم عدد المنشورات"), Lang::Ar);
    }

    #[test]
    fn count_sentence() {
        let s = count(EntityKind::Post, 7, "/posts", Lang::En);
        assert!(s.contains('7'));
        assert!(s.ends_with("/posts"));
    }

    #[test]
    fn empty_categories_sentence() {
        let s = categories(EntityKind::Mentorship, &[], "/mentorships", Lang::En);
        assert!(s.starts_with("There are no mentorships categories"));
        assert!(s.contains("/mentorships"));
    }
}
