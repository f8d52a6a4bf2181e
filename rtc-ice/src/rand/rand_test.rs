use super::*;
use std::collections::HashSet;

fn is_ice_chars(s: &str) -> bool {
    s.bytes().all(|b| ICE_CHARS.contains(&b))
}

#[test]
fn test_generated_values_are_distinct() {
    let generators: [(&str, fn() -> String); 3] = [
        ("candidate id", generate_cand_id),
        ("pwd", generate_pwd),
        ("ufrag", generate_ufrag),
    ];
    for (name, generate) in generators {
        let values: HashSet<String> = (0..100).map(|_| generate()).collect();
        assert_eq!(values.len(), 100, "{name} collided");
    }
}

#[test]
fn test_generated_values_use_ice_chars() {
    assert_eq!(generate_ufrag().len(), UFRAG_LEN);
    assert_eq!(generate_pwd().len(), PWD_LEN);
    assert!(is_ice_chars(&generate_ufrag()));
    assert!(is_ice_chars(&generate_pwd()));

    let id = generate_cand_id();
    let foundation = id.strip_prefix("candidate:").expect("prefix");
    assert_eq!(foundation.len(), FOUNDATION_LEN);
    assert!(is_ice_chars(foundation));
}

#[test]
fn test_local_credentials() -> Result<()> {
    let (ufrag, pwd) = local_credentials(String::new(), String::new())?;
    assert_eq!(ufrag.len(), UFRAG_LEN);
    assert_eq!(pwd.len(), PWD_LEN);

    let (ufrag, pwd) = local_credentials("abc".to_owned(), "p".repeat(16))?;
    assert_eq!(ufrag, "abc");
    assert_eq!(pwd, "p".repeat(16));

    assert!(matches!(
        local_credentials("ab".to_owned(), String::new()),
        Err(Error::ErrLocalUfragInsufficientBits)
    ));
    assert!(matches!(
        local_credentials(String::new(), "p".repeat(15)),
        Err(Error::ErrLocalPwdInsufficientBits)
    ));
    Ok(())
}
