use std::io::{BufReader, BufWriter};

use super::*;
use crate::curve::named_curve::NamedCurve;
use crate::signature_hash_algorithm::*;

fn round_trip(extension: &Extension) -> Result<Vec<u8>> {
    let mut raw = vec![];
    {
        let mut writer = BufWriter::<&mut Vec<u8>>::new(raw.as_mut());
        extension.marshal(&mut writer)?;
    }
    assert_eq!(raw.len(), extension.size(), "{extension:?} size");

    let mut reader = BufReader::new(raw.as_slice());
    let parsed = Extension::unmarshal(&mut reader)?;
    assert_eq!(parsed.as_ref(), Some(extension));

    Ok(raw)
}

#[test]
fn test_extension_use_srtp() -> Result<()> {
    let raw_use_srtp = vec![0x00, 0x0e, 0x00, 0x05, 0x00, 0x02, 0x00, 0x01, 0x00];
    let extension = Extension::UseSrtp(ExtensionUseSrtp {
        protection_profiles: vec![SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_80],
    });

    assert_eq!(round_trip(&extension)?, raw_use_srtp);
    Ok(())
}

#[test]
fn test_extension_supported_elliptic_curves() -> Result<()> {
    let raw = vec![0x00, 0x0a, 0x00, 0x06, 0x00, 0x04, 0x00, 0x1d, 0x00, 0x17];
    let extension = Extension::SupportedEllipticCurves(ExtensionSupportedEllipticCurves {
        elliptic_curves: vec![NamedCurve::X25519, NamedCurve::P256],
    });

    assert_eq!(round_trip(&extension)?, raw);
    Ok(())
}

#[test]
fn test_extension_server_name() -> Result<()> {
    let raw = vec![
        0x00, 0x00, 0x00, 0x0e, 0x00, 0x0c, 0x00, 0x00, 0x09, 0x6c, 0x6f, 0x63, 0x61, 0x6c, 0x68,
        0x6f, 0x73, 0x74,
    ];
    let extension = Extension::ServerName(ExtensionServerName {
        server_name: "localhost".to_owned(),
    });

    assert_eq!(round_trip(&extension)?, raw);
    Ok(())
}

#[test]
fn test_extension_misc_round_trip() -> Result<()> {
    let extensions = vec![
        Extension::SupportedPointFormats(ExtensionSupportedPointFormats {
            point_formats: vec![ELLIPTIC_CURVE_POINT_FORMAT_UNCOMPRESSED],
        }),
        Extension::SupportedSignatureAlgorithms(ExtensionSupportedSignatureAlgorithms {
            signature_hash_algorithms: vec![SignatureHashAlgorithm {
                hash: HashAlgorithm::Sha256,
                signature: SignatureAlgorithm::Ecdsa,
            }],
        }),
        Extension::UseExtendedMasterSecret(ExtensionUseExtendedMasterSecret { supported: true }),
        Extension::RenegotiationInfo(ExtensionRenegotiationInfo {
            renegotiated_connection: 0,
        }),
    ];

    for extension in &extensions {
        round_trip(extension)?;
    }
    Ok(())
}

#[test]
fn test_extension_unknown_is_skipped() -> Result<()> {
    // unassigned extension type with a two byte body
    let raw = vec![0x12, 0x34, 0x00, 0x02, 0xaa, 0xbb];
    let mut reader = BufReader::new(raw.as_slice());
    assert_eq!(Extension::unmarshal(&mut reader)?, None);
    Ok(())
}
