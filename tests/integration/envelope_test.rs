use crate::integration::common::{create_static_kms, seal_object};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use mailvault::{
    envelope::{
        decrypt_body, EncryptionContext, META_CONTENT_ALGORITHM, META_IV,
        META_MATERIAL_DESCRIPTION, META_TAG_LENGTH, META_UNENCRYPTED_LENGTH, META_WRAPPED_KEY,
    },
    DataKey, EnvelopeDecryptor, EnvelopeMetadata, Error, RemoteObject,
};
use std::collections::HashMap;

// AES-256-GCM with an all-zero key and IV over 16 zero bytes
const KAT_BODY: &str = "cea7403d4d606b6e074ec5d3baf39d18d0d1c8a799996bf0265b98b5d48ab919";

fn kat_object(context: &EncryptionContext, declared: usize) -> RemoteObject {
    let kms = create_static_kms();
    let mut metadata = HashMap::new();
    metadata.insert(
        META_WRAPPED_KEY.to_string(),
        BASE64.encode(kms.wrap_key(&[0_u8; 32], context).unwrap()),
    );
    metadata.insert(META_IV.to_string(), BASE64.encode([0_u8; 12]));
    metadata.insert(META_UNENCRYPTED_LENGTH.to_string(), declared.to_string());
    metadata.insert(
        META_MATERIAL_DESCRIPTION.to_string(),
        serde_json::to_string(context).unwrap(),
    );
    metadata.insert(META_CONTENT_ALGORITHM.to_string(), "AES/GCM/NoPadding".to_string());
    metadata.insert(META_TAG_LENGTH.to_string(), "128".to_string());

    RemoteObject {
        key: "inbox/kat".to_string(),
        last_modified: None,
        body: hex::decode(KAT_BODY).unwrap(),
        metadata,
    }
}

#[test]
fn test_decrypt_body_known_answer() {
    let key = DataKey::new(vec![0_u8; 32]).unwrap();
    let body = hex::decode(KAT_BODY).unwrap();

    assert_eq!(decrypt_body(&key, &[0_u8; 12], &body, 16).unwrap(), vec![0_u8; 16]);
}

#[tokio::test]
async fn test_decryptor_known_answer() {
    let mut context = HashMap::new();
    context.insert("kms_cmk_id".to_string(), "alias/incoming-mail".to_string());
    let object = kat_object(&context, 16);

    let metadata = EnvelopeMetadata::from_metadata(&object.metadata).unwrap();
    assert_eq!(metadata.unencrypted_length, 16);
    assert_eq!(metadata.context, context);

    let decryptor = EnvelopeDecryptor::new(create_static_kms());
    assert_eq!(decryptor.decrypt_object(&object).await.unwrap(), vec![0_u8; 16]);
}

#[tokio::test]
async fn test_tampered_body_fails_integrity() {
    let kms = create_static_kms();
    let mut object = seal_object(&kms, "inbox/a", b"From: a\r\n\r\nbody", None);
    object.body[0] ^= 0x01;

    let decryptor = EnvelopeDecryptor::new(kms);
    let err = decryptor.decrypt_object(&object).await.unwrap_err();
    assert!(matches!(err, Error::Integrity(_)), "{:?}", err);
}

#[tokio::test]
async fn test_short_body_is_format_error() {
    let kms = create_static_kms();
    let mut object = seal_object(&kms, "inbox/a", b"x", None);
    object.body.truncate(8);

    let decryptor = EnvelopeDecryptor::new(kms);
    let err = decryptor.decrypt_object(&object).await.unwrap_err();
    assert!(matches!(err, Error::Format(_)), "{:?}", err);
}

#[tokio::test]
async fn test_declared_length_beyond_plaintext_is_rejected() {
    let mut context = HashMap::new();
    context.insert("kms_cmk_id".to_string(), "alias/incoming-mail".to_string());
    let object = kat_object(&context, 17);

    let decryptor = EnvelopeDecryptor::new(create_static_kms());
    let err = decryptor.decrypt_object(&object).await.unwrap_err();
    assert!(matches!(err, Error::MalformedMetadata(_)), "{:?}", err);
}

#[tokio::test]
async fn test_unsupported_content_algorithm() {
    let object = {
        let mut o = kat_object(&HashMap::new(), 16);
        o.metadata
            .insert(META_CONTENT_ALGORITHM.to_string(), "AES/CBC/PKCS5Padding".to_string());
        o
    };

    let decryptor = EnvelopeDecryptor::new(create_static_kms());
    let err = decryptor.decrypt_object(&object).await.unwrap_err();
    assert!(matches!(err, Error::Crypto(_)), "{:?}", err);
}
