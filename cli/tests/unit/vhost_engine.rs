//! Vhost locator and mutator against real files in a sandbox.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use jmaka_cli::application::ports::{InsertOutcome, VhostEditor};
use jmaka_cli::application::services::vhost;
use jmaka_cli::domain::error::{InstanceError, VhostError};
use jmaka_common::{InstanceSlug, include_directive};

use crate::helpers::{FixedChooser, Sandbox, backups_of, http_vhost, read, tls_vhost};

const DOMAIN: &str = "shop.example.com";

fn slug(name: &str) -> InstanceSlug {
    InstanceSlug::normalize(name).unwrap()
}

#[test]
fn insert_places_include_after_server_name_and_is_idempotent() {
    let sb = Sandbox::new();
    let site = sb.nginx_file("sites-enabled/shop.conf", &tls_vhost(DOMAIN));
    let chooser = FixedChooser::default();
    let directive = include_directive(&sb.settings.snippet_path(&slug("a")));

    let first = vhost::attach(&sb.host, &chooser, &sb.settings, &slug("a"), DOMAIN).unwrap();
    assert_eq!(first.path, site);
    assert_eq!(first.outcome, InsertOutcome::Inserted { blocks: 1 });

    let text = read(&site);
    let expected = format!("    server_name {DOMAIN} www.{DOMAIN};\n    {directive}\n");
    assert!(text.contains(&expected), "include not placed:\n{text}");

    let second = vhost::attach(&sb.host, &chooser, &sb.settings, &slug("a"), DOMAIN).unwrap();
    assert_eq!(second.outcome, InsertOutcome::AlreadyPresent);
    assert_eq!(read(&site), text);
    assert_eq!(read(&site).matches(&directive).count(), 1);
    assert_eq!(chooser.asked.get(), 0, "single candidate needs no choice");
}

#[test]
fn one_backup_per_file_per_run() {
    let sb = Sandbox::new();
    let site = sb.nginx_file("sites-enabled/shop.conf", &tls_vhost(DOMAIN));
    let original = read(&site);
    let chooser = FixedChooser::default();

    vhost::attach(&sb.host, &chooser, &sb.settings, &slug("a"), DOMAIN).unwrap();
    vhost::attach(&sb.host, &chooser, &sb.settings, &slug("b"), DOMAIN).unwrap();

    let backups = backups_of(&site);
    assert_eq!(backups.len(), 1);
    assert_eq!(read(&backups[0]), original);
}

#[test]
fn later_run_never_overwrites_an_earlier_backup() {
    let sb = Sandbox::new();
    let site = sb.nginx_file("sites-enabled/shop.conf", &tls_vhost(DOMAIN));
    let chooser = FixedChooser::default();

    vhost::attach(&sb.host, &chooser, &sb.settings, &slug("a"), DOMAIN).unwrap();
    let second_run = sb.next_run();
    vhost::attach(&second_run, &chooser, &sb.settings, &slug("b"), DOMAIN).unwrap();

    let backups = backups_of(&site);
    assert_eq!(backups.len(), 2);
    assert_ne!(read(&backups[0]), read(&backups[1]));
}

#[test]
fn every_matching_server_block_gets_the_include() {
    let sb = Sandbox::new();
    let text = format!("{}\n{}", http_vhost(DOMAIN), tls_vhost(DOMAIN));
    let site = sb.nginx_file("sites-enabled/shop.conf", &text);

    let attached =
        vhost::attach(&sb.host, &FixedChooser::default(), &sb.settings, &slug("a"), DOMAIN)
            .unwrap();
    assert_eq!(attached.outcome, InsertOutcome::Inserted { blocks: 2 });
    let directive = include_directive(&sb.settings.snippet_path(&slug("a")));
    assert_eq!(read(&site).matches(&directive).count(), 2);
}

#[test]
fn crlf_files_keep_their_line_endings() {
    let sb = Sandbox::new();
    let text = tls_vhost(DOMAIN).replace('\n', "\r\n");
    let site = sb.nginx_file("sites-enabled/shop.conf", &text);

    vhost::attach(&sb.host, &FixedChooser::default(), &sb.settings, &slug("a"), DOMAIN).unwrap();
    let directive = include_directive(&sb.settings.snippet_path(&slug("a")));
    let after = read(&site);
    assert!(after.contains(&format!("    {directive}\r\n")));
    assert!(!after.replace("\r\n", "").contains('\n'));
}

#[test]
fn detach_only_removes_the_named_instance() {
    let sb = Sandbox::new();
    let site = sb.nginx_file("sites-enabled/shop.conf", &tls_vhost(DOMAIN));
    let chooser = FixedChooser::default();
    vhost::attach(&sb.host, &chooser, &sb.settings, &slug("a"), DOMAIN).unwrap();
    vhost::attach(&sb.host, &chooser, &sb.settings, &slug("ab"), DOMAIN).unwrap();

    let modified = vhost::detach(&sb.host, &sb.settings, Some(&slug("a"))).unwrap();
    assert_eq!(modified.len(), 1);

    let text = read(&site);
    let a = include_directive(&sb.settings.snippet_path(&slug("a")));
    let ab = include_directive(&sb.settings.snippet_path(&slug("ab")));
    assert!(!text.contains(&a));
    assert!(text.contains(&ab));
}

#[test]
fn detach_sweeps_the_whole_tree_and_skips_ineligible_files() {
    let sb = Sandbox::new();
    let include = include_directive(&sb.settings.snippet_path(&slug("a")));
    let body = format!("server {{\n    server_name {DOMAIN};\n    {include}\n}}\n");

    let conf = sb.nginx_file("conf.d/shop.conf", &body);
    let no_ext = sb.nginx_file("sites-enabled/default", &body);
    let nested = sb.nginx_file("extra/deep/app.conf", &body);
    let notes = sb.nginx_file("notes.txt", &body);
    let commented = sb.nginx_file(
        "conf.d/old.conf",
        &format!("server {{\n    server_name {DOMAIN};\n    # {include}\n}}\n"),
    );
    let commented_before = read(&commented);

    let mut modified = vhost::detach(&sb.host, &sb.settings, Some(&slug("a"))).unwrap();
    modified.sort();
    let mut expected: Vec<_> = [&conf, &no_ext, &nested]
        .iter()
        .map(|p| std::fs::canonicalize(p).unwrap())
        .collect();
    expected.sort();
    assert_eq!(modified, expected);

    for path in [&conf, &no_ext, &nested] {
        assert!(!read(path).contains(&include));
        assert_eq!(backups_of(path).len(), 1);
    }
    assert!(read(&notes).contains(&include), "non-.conf outside site dirs is left alone");
    assert_eq!(read(&commented), commented_before);
    assert!(backups_of(&commented).is_empty());
}

#[test]
fn sweep_without_instance_removes_every_managed_include() {
    let sb = Sandbox::new();
    let site = sb.nginx_file("sites-enabled/shop.conf", &tls_vhost(DOMAIN));
    let chooser = FixedChooser::default();
    vhost::attach(&sb.host, &chooser, &sb.settings, &slug("a"), DOMAIN).unwrap();
    vhost::attach(&sb.host, &chooser, &sb.settings, &slug("b"), DOMAIN).unwrap();

    let modified = vhost::detach(&sb.host, &sb.settings, None).unwrap();
    assert_eq!(modified.len(), 1);
    assert_eq!(read(&site), tls_vhost(DOMAIN));
}

#[test]
fn unbalanced_file_is_left_untouched_without_backup() {
    let sb = Sandbox::new();
    let broken = format!("server {{\n    listen 80;\n    server_name {DOMAIN};\n");
    let site = sb.nginx_file("sites-enabled/broken.conf", &broken);

    let err = vhost::attach(&sb.host, &FixedChooser::default(), &sb.settings, &slug("a"), DOMAIN)
        .unwrap_err();
    match err.downcast_ref::<VhostError>() {
        Some(VhostError::Unparsable { line, .. }) => assert_eq!(*line, 3),
        other => panic!("expected Unparsable, got {other:?}"),
    }
    assert_eq!(read(&site), broken);
    assert!(backups_of(&site).is_empty());
}

#[test]
fn brace_inside_quotes_is_refused() {
    let sb = Sandbox::new();
    let text = format!(
        "server {{\n    server_name {DOMAIN};\n    add_header X-Test \"{{\";\n}}\n"
    );
    let site = sb.nginx_file("sites-enabled/quoted.conf", &text);

    let err = sb
        .host
        .insert(&site, DOMAIN, "include /x/jmaka-a.conf;")
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<VhostError>(),
        Some(VhostError::Unparsable { .. })
    ));
    assert_eq!(read(&site), text);
}

#[test]
fn server_name_outside_a_server_block_is_not_a_match() {
    let sb = Sandbox::new();
    let site = sb.nginx_file(
        "sites-enabled/loose.conf",
        &format!("server_name {DOMAIN};\n"),
    );

    let err = sb.host.insert(&site, DOMAIN, "include /x/jmaka-a.conf;").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<VhostError>(),
        Some(VhostError::DomainNotInFile { .. })
    ));
    assert!(backups_of(&site).is_empty());
}

#[test]
fn missing_vhost_file_is_not_found() {
    let sb = Sandbox::new();
    let err = sb
        .host
        .insert(&sb.nginx().join("sites-enabled/nope.conf"), DOMAIN, "include x;")
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<VhostError>(),
        Some(VhostError::NotFound(_))
    ));
}

#[test]
fn locate_ranks_tls_above_directory_order() {
    let sb = Sandbox::new();
    let plain = sb.nginx_file("sites-enabled/y.conf", &http_vhost(DOMAIN));
    let tls = sb.nginx_file("conf.d/x.conf", &tls_vhost(DOMAIN));
    sb.nginx_file("sites-enabled/other.conf", &tls_vhost("other.example.com"));

    let ranked = vhost::locate(&sb.host, &sb.settings, DOMAIN).unwrap();
    let found: Vec<_> = ranked.iter().map(|c| (c.path.clone(), c.score)).collect();
    assert_eq!(found, vec![(tls.clone(), 2), (plain, 0)]);

    let chooser = FixedChooser::pick(0);
    let attached = vhost::attach(&sb.host, &chooser, &sb.settings, &slug("a"), DOMAIN).unwrap();
    assert_eq!(chooser.asked.get(), 1);
    assert_eq!(attached.path, tls);
}

#[test]
fn locate_ignores_backups_and_editor_leftovers() {
    let sb = Sandbox::new();
    sb.nginx_file("sites-enabled/shop.conf.bak.20240101-000000", &tls_vhost(DOMAIN));
    sb.nginx_file("sites-enabled/shop.conf~", &tls_vhost(DOMAIN));
    sb.nginx_file("sites-enabled/.shop.conf.swp", &tls_vhost(DOMAIN));

    let err = vhost::locate(&sb.host, &sb.settings, DOMAIN).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<VhostError>(),
        Some(VhostError::NoCandidate { .. })
    ));
}

#[test]
fn locate_rejects_malformed_domain() {
    let sb = Sandbox::new();
    let err = vhost::locate(&sb.host, &sb.settings, "bad domain").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<InstanceError>(),
        Some(InstanceError::InvalidDomain(_))
    ));
}

#[test]
fn symlinked_vhost_edits_the_target_and_keeps_the_link() {
    let sb = Sandbox::new();
    let real = sb.nginx_file("sites-available/shop.conf", &tls_vhost(DOMAIN));
    let link = sb.nginx().join("sites-enabled/shop.conf");
    std::os::unix::fs::symlink(&real, &link).unwrap();

    vhost::attach(&sb.host, &FixedChooser::default(), &sb.settings, &slug("a"), DOMAIN).unwrap();

    assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
    let directive = include_directive(&sb.settings.snippet_path(&slug("a")));
    assert!(read(&real).contains(&directive));
    assert_eq!(backups_of(&real).len(), 1);
    assert!(backups_of(&link).is_empty());
}

#[test]
fn the_same_file_reached_twice_is_one_candidate() {
    let sb = Sandbox::new();
    let real = sb.nginx_file("sites-available/shop.conf", &tls_vhost(DOMAIN));
    std::os::unix::fs::symlink(&real, sb.nginx().join("sites-enabled/shop.conf")).unwrap();
    std::os::unix::fs::symlink(&real, sb.nginx().join("conf.d/shop.conf")).unwrap();

    let ranked = vhost::locate(&sb.host, &sb.settings, DOMAIN).unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].path, sb.nginx().join("sites-enabled/shop.conf"));
}

#[test]
fn sweep_edits_a_file_reached_through_two_links_once() {
    let sb = Sandbox::new();
    let include = include_directive(&sb.settings.snippet_path(&slug("a")));
    let real = sb.nginx_file(
        "sites-available/shop.conf",
        &format!("server {{\n    server_name {DOMAIN};\n    {include}\n}}\n"),
    );
    std::os::unix::fs::symlink(&real, sb.nginx().join("sites-enabled/shop.conf")).unwrap();

    let modified = vhost::detach(&sb.host, &sb.settings, Some(&slug("a"))).unwrap();
    assert_eq!(modified, vec![std::fs::canonicalize(&real).unwrap()]);
    assert_eq!(backups_of(&real).len(), 1);
}

/// A vhost saved in Latin-1 with a non-ASCII comment.
fn latin1_vhost(extra: &str) -> Vec<u8> {
    let mut text = b"# Configura\xe7\xe3o do site\n".to_vec();
    text.extend_from_slice(
        format!("server {{\n    listen 443 ssl;\n    server_name {DOMAIN};\n{extra}").as_bytes(),
    );
    text.extend_from_slice(b"    # caf\xe9\n}\n");
    text
}

#[test]
fn latin1_vhost_is_located_and_edited_byte_for_byte() {
    let sb = Sandbox::new();
    let original = latin1_vhost("");
    let site = sb.nginx_file("conf.d/latin1.conf", &original);

    let ranked = vhost::locate(&sb.host, &sb.settings, DOMAIN).unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!((&ranked[0].path, ranked[0].score), (&site, 2));

    let attached =
        vhost::attach(&sb.host, &FixedChooser::default(), &sb.settings, &slug("a"), DOMAIN)
            .unwrap();
    assert_eq!(attached.outcome, InsertOutcome::Inserted { blocks: 1 });

    let directive = include_directive(&sb.settings.snippet_path(&slug("a")));
    assert_eq!(
        std::fs::read(&site).unwrap(),
        latin1_vhost(&format!("    {directive}\n"))
    );
    let backups = backups_of(&site);
    assert_eq!(backups.len(), 1);
    assert_eq!(std::fs::read(&backups[0]).unwrap(), original);
}

#[test]
fn sweep_removes_the_include_from_a_latin1_file() {
    let sb = Sandbox::new();
    let include = include_directive(&sb.settings.snippet_path(&slug("a")));
    let site = sb.nginx_file("conf.d/latin1.conf", latin1_vhost(&format!("    {include}\n")));

    let modified = vhost::detach(&sb.host, &sb.settings, Some(&slug("a"))).unwrap();
    assert_eq!(modified, vec![std::fs::canonicalize(&site).unwrap()]);
    assert_eq!(std::fs::read(&site).unwrap(), latin1_vhost(""));
    assert_eq!(backups_of(&site).len(), 1);
}
