use gitlet_tags::handles::tracked_count;
use gitlet_tags::objects::tag::{encode, encode_with_signature};
use gitlet_tags::{Fmt, Object, Oid, Repository, Signature, TagError};
use std::collections::HashSet;
use tempfile::TempDir;

fn setup() -> (TempDir, Repository) {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    (dir, repo)
}

fn blob(repo: &Repository, content: &str) -> Object {
    let oid = repo.write_object(Fmt::Blob, content.as_bytes().to_vec()).unwrap();
    repo.lookup_object(&oid).unwrap()
}

fn tagger() -> Signature {
    Signature::from_timestamp("Jane Doe", "jane@example.com", 1700000000, 60).unwrap()
}

#[derive(Debug)]
struct VisitorFailed(&'static str);

impl std::fmt::Display for VisitorFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "visitor failed at {}", self.0)
    }
}

impl std::error::Error for VisitorFailed {}

#[test]
fn test_annotated_tag_round_trip() {
    let (_dir, repo) = setup();
    let target = blob(&repo, "release contents");

    for message in ["first release", "first release\n", "multi\nline\nmessage"] {
        let name = format!("v{}", message.len());
        let oid = repo
            .tags()
            .create(&name, &target, &tagger(), message, false)
            .unwrap();

        let tag = repo.lookup_tag(&oid).unwrap();

        assert_eq!(tag.id(), oid);
        assert_eq!(tag.name(), name);
        assert_eq!(tag.message().trim_end_matches('\n'), message.trim_end_matches('\n'));
        assert!(tag.message().ends_with('\n') && !tag.message().ends_with("\n\n"));
        assert_eq!(tag.tagger(), tagger());
        assert_eq!(tag.target_id(), target.id());
        assert_eq!(tag.target_type(), Fmt::Blob);

        let resolved = tag.target().unwrap();
        assert_eq!(resolved.id(), target.id());
        assert_eq!(&resolved.data()[..], b"release contents");
    }
}

#[test]
fn test_created_object_matches_tag_buffer() {
    let (_dir, repo) = setup();
    let target = blob(&repo, "x");

    let buffer = repo
        .tags()
        .create_tag_buffer("v1", &target, &tagger(), "hello");
    let oid = repo
        .tags()
        .create("v1", &target, &tagger(), "hello", false)
        .unwrap();

    let object = repo.lookup_object(&oid).unwrap();
    assert_eq!(object.kind(), Fmt::Tag);
    assert_eq!(object.data(), &buffer);
    assert_eq!(
        buffer,
        encode(&target.id(), Fmt::Blob, "v1", &tagger(), "hello")
    );
}

#[test]
fn test_content_addressing() {
    let (_dir, repo) = setup();
    let target = blob(&repo, "x");
    let tags = repo.tags();

    let first = tags.create("v1", &target, &tagger(), "same", false).unwrap();
    let second = tags.create("v1", &target, &tagger(), "same", true).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_conflict_policy() {
    let (_dir, repo) = setup();
    let target = blob(&repo, "x");
    let tags = repo.tags();

    let first = tags.create("v1", &target, &tagger(), "one", false).unwrap();

    let err = tags
        .create("v1", &target, &tagger(), "two", false)
        .unwrap_err();
    assert!(matches!(err, TagError::NameConflict(_)), "{err:?}");
    assert_eq!(tags.lookup("v1").unwrap(), Some(first));

    let second = tags.create("v1", &target, &tagger(), "two", true).unwrap();
    assert_ne!(first, second);
    assert_eq!(tags.lookup("v1").unwrap(), Some(second));
}

#[test]
fn test_lightweight_conflict_policy() {
    let (_dir, repo) = setup();
    let a = blob(&repo, "a");
    let b = blob(&repo, "b");
    let tags = repo.tags();

    assert_eq!(tags.create_lightweight("light", &a, false).unwrap(), a.id());

    let err = tags.create_lightweight("light", &b, false).unwrap_err();
    assert!(matches!(err, TagError::NameConflict(_)), "{err:?}");

    assert_eq!(tags.create_lightweight("light", &b, true).unwrap(), b.id());
    assert_eq!(tags.lookup("light").unwrap(), Some(b.id()));
}

#[test]
fn test_lightweight_tag_is_not_a_tag_object() {
    let (_dir, repo) = setup();
    let target = blob(&repo, "x");

    let oid = repo.tags().create_lightweight("light", &target, false).unwrap();

    let err = repo.lookup_tag(&oid).unwrap_err();
    assert!(matches!(err, TagError::InvalidTarget(_)), "{err:?}");
}

#[test]
fn test_create_with_foreign_target() {
    let (_dir, repo) = setup();
    let (_other_dir, other) = setup();
    let foreign = blob(&other, "only in the other repository");

    let err = repo
        .tags()
        .create("v1", &foreign, &tagger(), "m", false)
        .unwrap_err();
    assert!(matches!(err, TagError::InvalidTarget(_)), "{err:?}");

    let err = repo
        .tags()
        .create_lightweight("v1", &foreign, false)
        .unwrap_err();
    assert!(matches!(err, TagError::InvalidTarget(_)), "{err:?}");

    assert!(repo.tags().list().unwrap().is_empty());
}

#[test]
fn test_invalid_tag_name() {
    let (_dir, repo) = setup();
    let target = blob(&repo, "x");

    for name in ["", "a..b", "with space", "trailing/", "x.lock"] {
        let err = repo
            .tags()
            .create_lightweight(name, &target, false)
            .unwrap_err();
        assert!(matches!(err, TagError::InvalidName(_)), "{name:?}: {err:?}");
    }
}

#[test]
fn test_create_with_signature() {
    let (_dir, repo) = setup();
    let target = blob(&repo, "signed contents");
    let tags = repo.tags();

    let buffer = tags.create_tag_buffer("v1.0.0", &target, &tagger(), "signed release");
    let signature = "-----BEGIN PGP SIGNATURE-----\n\niQEzBAABCAAdFiEE\n-----END PGP SIGNATURE-----";

    let oid = tags.create_with_signature(&buffer, signature, false).unwrap();

    let expected = encode_with_signature(&buffer, signature);
    let object = repo.lookup_object(&oid).unwrap();
    assert_eq!(object.data(), &expected);

    let tag = repo.lookup_tag(&oid).unwrap();
    assert_eq!(tag.name(), "v1.0.0");
    assert!(tag.message().starts_with("signed release\n-----BEGIN PGP SIGNATURE-----"));
    assert_eq!(tags.lookup("v1.0.0").unwrap(), Some(oid));

    let err = tags.create_with_signature(&buffer, signature, false).unwrap_err();
    assert!(matches!(err, TagError::NameConflict(_)), "{err:?}");
}

#[test]
fn test_create_from_malformed_buffer() {
    let (_dir, repo) = setup();

    let err = repo
        .tags()
        .create_from_buffer(b"object nope\ntype commit\ntag v1\n\nmsg\n", false)
        .unwrap_err();
    assert!(matches!(err, TagError::MalformedBuffer(_)), "{err:?}");

    let err = repo
        .tags()
        .create_from_buffer(b"just some text", false)
        .unwrap_err();
    assert!(matches!(err, TagError::MalformedBuffer(_)), "{err:?}");
}

#[test]
fn test_create_from_buffer_rejects_bad_headers() {
    let (_dir, repo) = setup();
    let target = blob(&repo, "x");
    let tags = repo.tags();

    let bad_tagger = format!(
        "object {}\ntype blob\ntag v1\ntagger not a signature at all\n\nmsg\n",
        target.id()
    );
    let reordered = format!("tag v2\ntype blob\nobject {}\nbogus header\n\nmsg\n", target.id());
    let extra = format!("object {}\ntype blob\ntag v3\nbogus header\n\nmsg\n", target.id());

    for buffer in [bad_tagger, reordered, extra] {
        let err = tags.create_from_buffer(buffer.as_bytes(), false).unwrap_err();
        assert!(matches!(err, TagError::MalformedBuffer(_)), "{err:?}");
    }

    assert!(tags.list().unwrap().is_empty());
}

#[test]
fn test_create_from_buffer_with_wrong_type() {
    let (_dir, repo) = setup();
    let target = blob(&repo, "x");

    let buffer = encode(&target.id(), Fmt::Commit, "v1", &tagger(), "m");

    let err = repo.tags().create_from_buffer(&buffer, false).unwrap_err();
    assert!(matches!(err, TagError::InvalidTarget(_)), "{err:?}");
}

#[test]
fn test_remove_keeps_object() {
    let (_dir, repo) = setup();
    let target = blob(&repo, "x");
    let tags = repo.tags();

    let oid = tags.create("v1", &target, &tagger(), "m", false).unwrap();

    tags.remove("v1").unwrap();

    assert_eq!(tags.lookup("v1").unwrap(), None);
    assert!(tags.list().unwrap().is_empty());
    assert_eq!(repo.lookup_tag(&oid).unwrap().name(), "v1");
}

#[test]
fn test_remove_missing_tag() {
    let (_dir, repo) = setup();

    let err = repo.tags().remove("nope").unwrap_err();
    assert!(matches!(err, TagError::NotFound(_)), "{err:?}");
}

#[test]
fn test_list_and_list_match() {
    let (_dir, repo) = setup();
    let target = blob(&repo, "x");
    let tags = repo.tags();

    for name in ["v1.0.0", "v1.0.1", "v2.0.0"] {
        tags.create_lightweight(name, &target, false).unwrap();
    }

    let all: HashSet<_> = tags.list().unwrap().into_iter().collect();
    assert_eq!(all, HashSet::from(["v1.0.0".to_string(), "v1.0.1".to_string(), "v2.0.0".to_string()]));

    let matched: HashSet<_> = tags.list_match("v1.*").unwrap().into_iter().collect();
    assert_eq!(matched, HashSet::from(["v1.0.0".to_string(), "v1.0.1".to_string()]));

    assert_eq!(tags.list_match("v?.0.[1]").unwrap(), vec!["v1.0.1"]);
    assert!(tags.list_match("v3*").unwrap().is_empty());

    // stable for a given store state
    assert_eq!(tags.list().unwrap(), tags.list().unwrap());
}

#[test]
fn test_list_nested_names() {
    let (_dir, repo) = setup();
    let target = blob(&repo, "x");
    let tags = repo.tags();

    tags.create_lightweight("release/1.0", &target, false).unwrap();

    assert_eq!(tags.list().unwrap(), vec!["release/1.0"]);
    assert_eq!(tags.list_match("release/*").unwrap(), vec!["release/1.0"]);
}

#[test]
fn test_list_match_invalid_pattern() {
    let (_dir, repo) = setup();

    let err = repo.tags().list_match("v[1").unwrap_err();
    assert!(matches!(err, TagError::InvalidPattern { .. }), "{err:?}");
}

#[test]
fn test_foreach_completeness() {
    let (_dir, repo) = setup();
    let target = blob(&repo, "x");
    let tags = repo.tags();

    let annotated = tags.create("a", &target, &tagger(), "m", false).unwrap();
    let light = tags.create_lightweight("b", &target, false).unwrap();

    let mut seen = Vec::new();
    tags.foreach(|name, id| {
        seen.push((name.to_string(), *id));
        Ok(())
    })
    .unwrap();

    seen.sort();
    assert_eq!(
        seen,
        vec![
            ("refs/tags/a".to_string(), annotated),
            ("refs/tags/b".to_string(), light),
        ]
    );
    assert_eq!(tracked_count(), 0);
}

#[test]
fn test_foreach_short_circuit() {
    let (_dir, repo) = setup();
    let target = blob(&repo, "x");
    let tags = repo.tags();

    for name in ["a", "b", "c"] {
        tags.create_lightweight(name, &target, false).unwrap();
    }

    let mut calls = 0;
    let err = tags
        .foreach(|_, _| {
            calls += 1;
            Err(VisitorFailed("first").into())
        })
        .unwrap_err();

    assert_eq!(calls, 1);
    match err {
        TagError::Callback(err) => {
            let original = err.downcast_ref::<VisitorFailed>().unwrap();
            assert_eq!(original.0, "first");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(tracked_count(), 0);
}

#[test]
fn test_foreach_visitor_can_use_repository() {
    let (_dir, repo) = setup();
    let target = blob(&repo, "x");
    repo.tags()
        .create("a", &target, &tagger(), "m", false)
        .unwrap();

    let mut targets = Vec::<Oid>::new();
    repo.tags()
        .foreach(|_, id| {
            let tag = repo.lookup_tag(id)?;
            targets.push(tag.target_id());
            Ok(())
        })
        .unwrap();

    assert_eq!(targets, vec![target.id()]);
}

#[test]
fn test_foreach_releases_handle_on_panic() {
    let (_dir, repo) = setup();
    let target = blob(&repo, "x");
    repo.tags().create_lightweight("a", &target, false).unwrap();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = repo.tags().foreach(|_, _| panic!("visitor blew up"));
    }));

    assert!(result.is_err());
    assert_eq!(tracked_count(), 0);
}

#[test]
fn test_foreach_on_empty_repository() {
    let (_dir, repo) = setup();

    repo.tags()
        .foreach(|name, _| anyhow::bail!("unexpected tag {}", name))
        .unwrap();
}

#[test]
fn test_peel_follows_nested_tags() {
    let (_dir, repo) = setup();
    let target = blob(&repo, "x");
    let tags = repo.tags();

    let inner = tags.create("inner", &target, &tagger(), "m", false).unwrap();
    let inner = repo.lookup_object(&inner).unwrap();
    let outer = tags.create("outer", &inner, &tagger(), "m", false).unwrap();

    let outer = repo.lookup_tag(&outer).unwrap();
    assert_eq!(outer.target_type(), Fmt::Tag);
    assert_eq!(outer.peel().unwrap().id(), target.id());
}

#[test]
fn test_target_missing_from_store() {
    let (_dir, repo) = setup();
    let missing = Oid::from_bytes([9; 20]);

    let buffer = encode(&missing, Fmt::Blob, "dangling", &tagger(), "m");
    let oid = repo.write_object(Fmt::Tag, buffer).unwrap();

    let tag = repo.lookup_tag(&oid).unwrap();
    let err = tag.target().unwrap_err();
    assert!(matches!(err, TagError::InvalidTarget(_)), "{err:?}");
}

#[test]
fn test_tag_without_tagger() {
    let (_dir, repo) = setup();
    let target = blob(&repo, "x");

    let buffer = format!("object {}\ntype blob\ntag old\n\nno tagger\n", target.id());
    let oid = repo.write_object(Fmt::Tag, buffer.into_bytes()).unwrap();

    let tag = repo.lookup_tag(&oid).unwrap();
    assert_eq!(tag.tagger(), Signature::default());
    assert_eq!(tag.message(), "no tagger\n");
}
