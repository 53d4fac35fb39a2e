//! Address classification against frozen vocabularies.
//!
//! Three independent predicates, each an O(1) hash lookup: disposable
//! domains, role-account local parts and free-provider domains. The
//! built-in vocabularies can be replaced wholesale, so callers (and tests)
//! only ever see `contains`-style membership checks.

use std::collections::HashSet;

use tracing::debug;

/// Domains operated by short-lived-inbox services.
const DISPOSABLE_DOMAINS: &[&str] = &[
    "10minutemail.com",
    "10minutemail.net",
    "20minutemail.com",
    "33mail.com",
    "anonbox.net",
    "anonymbox.com",
    "bccto.me",
    "burnermail.io",
    "byom.de",
    "deadaddress.com",
    "discard.email",
    "dispostable.com",
    "emailondeck.com",
    "fakeinbox.com",
    "fakemailgenerator.com",
    "getairmail.com",
    "getnada.com",
    "guerrillamail.biz",
    "guerrillamail.com",
    "guerrillamail.de",
    "guerrillamail.net",
    "guerrillamail.org",
    "harakirimail.com",
    "inboxalias.com",
    "incognitomail.org",
    "jetable.org",
    "mail-temporaire.fr",
    "mail7.io",
    "mailcatch.com",
    "maildrop.cc",
    "mailexpire.com",
    "mailinator.com",
    "mailinator.net",
    "mailnesia.com",
    "mailnull.com",
    "mintemail.com",
    "mohmal.com",
    "mytemp.email",
    "nowmymail.com",
    "objectmail.com",
    "onewaymail.com",
    "owlymail.com",
    "sharklasers.com",
    "spam4.me",
    "spamgourmet.com",
    "tempail.com",
    "temp-mail.io",
    "temp-mail.org",
    "tempinbox.com",
    "tempmail.com",
    "tempmail.net",
    "tempmailo.com",
    "tempr.email",
    "throwawaymail.com",
    "trash-mail.com",
    "trashmail.com",
    "trashmail.net",
    "tempmailaddress.com",
    "yopmail.com",
    "yopmail.fr",
    "yopmail.net",
];

/// Local parts that address a function rather than a person.
const ROLE_PREFIXES: &[&str] = &[
    // Administrative
    "admin",
    "administrator",
    "postmaster",
    "hostmaster",
    "webmaster",
    "root",
    "sysadmin",
    // Support
    "support",
    "help",
    "helpdesk",
    "customerservice",
    "service",
    "tech",
    "technical",
    // Contact/Info
    "info",
    "information",
    "contact",
    "contactus",
    "hello",
    "hi",
    "enquiry",
    "enquiries",
    "inquiry",
    "feedback",
    // Sales/Marketing
    "sales",
    "marketing",
    "press",
    "media",
    "pr",
    "advertising",
    "ads",
    "partnerships",
    "partner",
    "business",
    "biz",
    // No-reply
    "noreply",
    "no-reply",
    "donotreply",
    "do-not-reply",
    "mailer-daemon",
    "mailerdaemon",
    "daemon",
    "bounce",
    "bounces",
    // Security/Abuse
    "abuse",
    "security",
    "spam",
    "phishing",
    "fraud",
    "compliance",
    "legal",
    "privacy",
    "dmca",
    // Finance
    "billing",
    "invoice",
    "invoices",
    "accounting",
    "accounts",
    "finance",
    "payments",
    "payroll",
    // HR/Jobs
    "hr",
    "humanresources",
    "recruiting",
    "recruitment",
    "jobs",
    "careers",
    "career",
    "talent",
    "resume",
    "resumes",
    "cv",
    // Team/Department
    "team",
    "staff",
    "office",
    "reception",
    "all",
    "everyone",
    "company",
    "group",
    "dept",
    "department",
    // IT/Dev
    "it",
    "dev",
    "developer",
    "developers",
    "development",
    "engineering",
    "devops",
    "ops",
    "operations",
    "network",
    "sysops",
    "noc",
    // Orders/Shopping
    "orders",
    "order",
    "shop",
    "store",
    "checkout",
    "shipping",
    "delivery",
    "returns",
    "refund",
    "refunds",
    "fulfillment",
    // Newsletters/Lists
    "news",
    "newsletter",
    "newsletters",
    "updates",
    "subscribe",
    "subscriptions",
    "unsubscribe",
    "list",
    "lists",
    "announce",
    "announcements",
    "notifications",
    "alerts",
    // Social
    "social",
    "community",
    "forum",
    "blog",
    // Misc
    "test",
    "testing",
    "demo",
    "example",
    "sample",
    "null",
    "void",
    "nobody",
    "www",
    "ftp",
    "mail",
    "email",
];

/// Public-mailbox provider domains.
const FREE_PROVIDERS: &[&str] = &[
    // Google
    "gmail.com",
    "googlemail.com",
    // Microsoft
    "outlook.com",
    "hotmail.com",
    "hotmail.co.uk",
    "hotmail.fr",
    "hotmail.de",
    "hotmail.it",
    "hotmail.es",
    "live.com",
    "live.co.uk",
    "live.fr",
    "live.de",
    "msn.com",
    // Yahoo
    "yahoo.com",
    "yahoo.co.uk",
    "yahoo.fr",
    "yahoo.de",
    "yahoo.it",
    "yahoo.es",
    "yahoo.co.in",
    "yahoo.ca",
    "yahoo.com.au",
    "yahoo.com.br",
    "yahoo.co.jp",
    "ymail.com",
    "rocketmail.com",
    // AOL/Verizon
    "aol.com",
    "aol.co.uk",
    "aim.com",
    "verizon.net",
    // Apple
    "icloud.com",
    "me.com",
    "mac.com",
    // ProtonMail
    "protonmail.com",
    "protonmail.ch",
    "proton.me",
    "pm.me",
    // Zoho
    "zoho.com",
    "zohomail.com",
    // Mail.com
    "mail.com",
    "email.com",
    "usa.com",
    "post.com",
    "europe.com",
    "asia.com",
    "consultant.com",
    "engineer.com",
    "doctor.com",
    "lawyer.com",
    "activist.com",
    "accountant.com",
    "techie.com",
    "cheerful.com",
    // GMX
    "gmx.com",
    "gmx.net",
    "gmx.de",
    "gmx.at",
    "gmx.ch",
    // Yandex
    "yandex.com",
    "yandex.ru",
    "yandex.ua",
    "ya.ru",
    // Mail.ru
    "mail.ru",
    "inbox.ru",
    "bk.ru",
    "list.ru",
    // QQ/163
    "qq.com",
    "163.com",
    "126.com",
    "sina.com",
    "sina.cn",
    "sohu.com",
    "aliyun.com",
    "foxmail.com",
    // Tutanota
    "tutanota.com",
    "tutanota.de",
    "tutamail.com",
    "tuta.io",
    // FastMail
    "fastmail.com",
    "fastmail.fm",
    // Rediffmail
    "rediffmail.com",
    "rediff.com",
    // Regional/Country specific
    "web.de",
    "freenet.de",
    "t-online.de",
    "libero.it",
    "virgilio.it",
    "free.fr",
    "orange.fr",
    "laposte.net",
    "sfr.fr",
    "wanadoo.fr",
    "wp.pl",
    "o2.pl",
    "interia.pl",
    "onet.pl",
    "seznam.cz",
    "centrum.cz",
    "rambler.ru",
    "ukr.net",
    "i.ua",
    "bigmir.net",
    "naver.com",
    "daum.net",
    "hanmail.net",
    "cox.net",
    "att.net",
    "sbcglobal.net",
    "bellsouth.net",
    "comcast.net",
    "charter.net",
    "earthlink.net",
    "juno.com",
    "optonline.net",
    "shaw.ca",
    "rogers.com",
    "sympatico.ca",
    "telus.net",
    "btinternet.com",
    "ntlworld.com",
    "sky.com",
    "blueyonder.co.uk",
    "talktalk.net",
    "virginmedia.com",
    "bigpond.com",
    "optusnet.com.au",
    "ozemail.com.au",
    // Indian providers
    "sify.com",
    "indiatimes.com",
    "sancharnet.in",
    "dataone.in",
    // Misc
    "lycos.com",
    "excite.com",
    "netscape.net",
    "inbox.com",
    "hushmail.com",
    "runbox.com",
    "lavabit.com",
    "mailfence.com",
    "disroot.org",
    "riseup.net",
    "autistici.org",
    "inventati.org",
];

/// Membership predicates over the three classification vocabularies.
///
/// Vocabularies are frozen at construction and read-only afterwards, so a
/// `Classifier` can be shared freely across workers.
#[derive(Debug, Clone)]
pub struct Classifier {
    disposable: HashSet<String>,
    roles: HashSet<String>,
    free_providers: HashSet<String>,
}

impl Classifier {
    /// Builds a classifier over custom vocabularies (lower-cased on entry).
    pub fn with_vocabularies(
        disposable: impl IntoIterator<Item = String>,
        roles: impl IntoIterator<Item = String>,
        free_providers: impl IntoIterator<Item = String>,
    ) -> Self {
        fn lower(iter: impl IntoIterator<Item = String>) -> HashSet<String> {
            iter.into_iter().map(|s| s.to_lowercase()).collect()
        }
        let classifier = Self {
            disposable: lower(disposable),
            roles: lower(roles),
            free_providers: lower(free_providers),
        };
        debug!(
            disposable = classifier.disposable.len(),
            roles = classifier.roles.len(),
            free_providers = classifier.free_providers.len(),
            "classifier initialized"
        );
        classifier
    }

    /// True when the domain belongs to a short-lived-inbox service.
    pub fn is_disposable(&self, domain: &str) -> bool {
        self.disposable.contains(domain.trim().to_lowercase().as_str())
    }

    /// True when the local part addresses a role rather than a person.
    ///
    /// Matches an exact role token, or a role token followed by `-`, `_`,
    /// `.` or a decimal digit (`support-2`, `sales.emea`, `admin1`).
    pub fn is_role_account(&self, local_part: &str) -> bool {
        let local = local_part.trim().to_lowercase();

        if self.roles.contains(local.as_str()) {
            return true;
        }

        for prefix in &self.roles {
            if let Some(rest) = local.strip_prefix(prefix.as_str()) {
                if let Some(first) = rest.chars().next() {
                    if matches!(first, '-' | '_' | '.') || first.is_ascii_digit() {
                        return true;
                    }
                }
            }
        }

        false
    }

    /// True when the domain is a public-mailbox provider.
    pub fn is_free_provider(&self, domain: &str) -> bool {
        self.free_providers
            .contains(domain.trim().to_lowercase().as_str())
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::with_vocabularies(
            DISPOSABLE_DOMAINS.iter().map(|s| s.to_string()),
            ROLE_PREFIXES.iter().map(|s| s.to_string()),
            FREE_PROVIDERS.iter().map(|s| s.to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposable_membership() {
        let c = Classifier::default();
        assert!(c.is_disposable("tempmail.com"));
        assert!(c.is_disposable("MAILINATOR.COM"));
        assert!(c.is_disposable(" yopmail.com "));
        assert!(!c.is_disposable("example.com"));
        assert!(!c.is_disposable("gmail.com"));
    }

    #[test]
    fn role_exact_match() {
        let c = Classifier::default();
        assert!(c.is_role_account("admin"));
        assert!(c.is_role_account("INFO"));
        assert!(c.is_role_account("no-reply"));
        assert!(!c.is_role_account("alice"));
    }

    #[test]
    fn role_prefix_with_separator_or_digit() {
        let c = Classifier::default();
        assert!(c.is_role_account("support-team"));
        assert!(c.is_role_account("sales_emea"));
        assert!(c.is_role_account("billing.2024"));
        assert!(c.is_role_account("admin1"));
        // A role token followed by a letter is a name, not a role.
        assert!(!c.is_role_account("infographic"));
        assert!(!c.is_role_account("administrative"));
    }

    #[test]
    fn free_provider_membership() {
        let c = Classifier::default();
        assert!(c.is_free_provider("gmail.com"));
        assert!(c.is_free_provider("Yahoo.Co.Uk"));
        assert!(!c.is_free_provider("garantbank.uz"));
    }

    #[test]
    fn flags_are_independent() {
        // admin@gmail.com is both a role account and a free provider; no
        // predicate shadows another.
        let c = Classifier::default();
        assert!(c.is_role_account("admin"));
        assert!(c.is_free_provider("gmail.com"));
        assert!(!c.is_disposable("gmail.com"));
    }

    #[test]
    fn classification_is_idempotent() {
        let c = Classifier::default();
        for _ in 0..2 {
            assert!(c.is_disposable("tempmail.com"));
            assert!(c.is_role_account("support"));
            assert!(c.is_free_provider("gmail.com"));
        }
    }

    #[test]
    fn custom_vocabularies() {
        let c = Classifier::with_vocabularies(
            vec!["Trash.Example".to_string()],
            vec!["frontdesk".to_string()],
            vec!["freebie.example".to_string()],
        );
        assert!(c.is_disposable("trash.example"));
        assert!(c.is_role_account("frontdesk_3"));
        assert!(c.is_free_provider("freebie.example"));
        assert!(!c.is_disposable("tempmail.com"));
    }
}
