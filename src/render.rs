//! Formatters for the generated daemon config files.

use crate::attributes::Section;
use crate::config::User;

const HEADER: &str = "# Generated by l2tp-ipsec. Local changes will be overwritten.\n";

/// ipsec.conf: sections without entries are bare lines (`version 2`),
/// others are a header followed by tab-indented `key=value` lines.
pub fn ipsec_conf(sections: &[Section]) -> String {
    let mut out = String::from(HEADER);
    for section in sections {
        out.push('\n');
        out.push_str(&format!("{}\n", section.name));
        for (key, value) in &section.entries {
            out.push_str(&format!("\t{}={}\n", key, value));
        }
    }
    out
}

/// ipsec.secrets: `<selector> : <secret>` per entry.
pub fn ipsec_secrets(entries: &[(String, String)]) -> String {
    let mut out = String::from(HEADER);
    for (selector, secret) in entries {
        out.push_str(&format!("{} : {}\n", selector, secret));
    }
    out
}

/// ppp chap-secrets: client, server, secret, allowed addresses.
pub fn chap_secrets(users: &[User]) -> String {
    let mut out = String::from(HEADER);
    out.push_str("# client\tserver\tsecret\tIP addresses\n");
    for user in users {
        out.push_str(&format!("\"{}\"\t*\t\"{}\"\t*\n", user.name, user.password));
    }
    out
}

/// xl2tpd.conf: ini-style `[section]` with `key = value` lines.
pub fn xl2tpd_conf(sections: &[Section]) -> String {
    let mut out = String::from(HEADER);
    for section in sections {
        out.push('\n');
        out.push_str(&format!("[{}]\n", section.name));
        for (key, value) in &section.entries {
            out.push_str(&format!("{} = {}\n", key, value));
        }
    }
    out
}

/// pppd options file: bare flags, or `key value`.
pub fn ppp_options(options: &[(String, String)]) -> String {
    let mut out = String::from(HEADER);
    for (key, value) in options {
        if value.is_empty() {
            out.push_str(&format!("{}\n", key));
        } else {
            out.push_str(&format!("{} {}\n", key, value));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(name: &str, entries: &[(&str, &str)]) -> Section {
        Section {
            name: name.into(),
            entries: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_ipsec_conf() {
        let out = ipsec_conf(&[
            section("version 2", &[]),
            section("config setup", &[("listen", "203.0.113.5"), ("protostack", "netkey")]),
        ]);

        let body: Vec<&str> = out.lines().skip(1).collect();
        assert_eq!(
            body,
            vec![
                "",
                "version 2",
                "",
                "config setup",
                "\tlisten=203.0.113.5",
                "\tprotostack=netkey",
            ]
        );
        assert!(out.starts_with("# Generated by l2tp-ipsec"));
    }

    #[test]
    fn test_ipsec_secrets() {
        let out = ipsec_secrets(&[(
            "203.0.113.5 %any".to_string(),
            "PSK \"preshared_secret\"".to_string(),
        )]);
        assert!(out.ends_with("203.0.113.5 %any : PSK \"preshared_secret\"\n"));
    }

    #[test]
    fn test_chap_secrets() {
        let out = chap_secrets(&[User {
            name: "alice".into(),
            password: "s3cret".into(),
        }]);
        assert!(out.ends_with("\"alice\"\t*\t\"s3cret\"\t*\n"));
    }

    #[test]
    fn test_xl2tpd_conf() {
        let out = xl2tpd_conf(&[section("global", &[("ipsec saref", "yes")])]);
        assert!(out.ends_with("\n[global]\nipsec saref = yes\n"));
    }

    #[test]
    fn test_ppp_options() {
        let out = ppp_options(&[
            ("require-mschap-v2".to_string(), String::new()),
            ("ms-dns".to_string(), "8.8.8.8".to_string()),
            ("ms-dns".to_string(), "8.8.4.4".to_string()),
        ]);
        assert!(out.ends_with("require-mschap-v2\nms-dns 8.8.8.8\nms-dns 8.8.4.4\n"));
    }
}
