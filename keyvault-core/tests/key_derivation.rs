//! Tests for key derivation

use keyvault_core::chains::{plugin_for, ChainImpl};
use keyvault_core::crypto::keys::*;
use keyvault_core::crypto::mnemonic::*;

const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

fn public_key_at(chain: ChainImpl, index: u32) -> PublicKey {
    let plugin = plugin_for(chain);
    let seed = mnemonic_to_seed(MNEMONIC, None).unwrap();
    let mut keys = batch_get_public_keys(
        plugin.curve(),
        &seed,
        &plugin.path_prefix(),
        &[plugin.relative_path(index)],
    )
    .unwrap();
    keys.remove(0).public_key
}

#[test]
fn test_ethereum_known_vector() {
    let plugin = plugin_for(ChainImpl::Evm);
    let address = plugin
        .address_from_public_key(&public_key_at(ChainImpl::Evm, 0))
        .unwrap();

    assert_eq!(address, "0x9858effd232b4033e47d90003d41ec34ecaeda94");
    assert_eq!(plugin.account_path(0), "m/44'/60'/0'/0/0");
}

#[test]
fn test_prefix_and_absolute_paths_agree() {
    let seed = mnemonic_to_seed(MNEMONIC, None).unwrap();

    for chain in ChainImpl::all() {
        let plugin = plugin_for(chain);
        let path = plugin.account_path(3);
        let private = batch_get_private_keys(plugin.curve(), &seed, &[path.clone()]).unwrap();
        let (derived_path, private_key) = &private[0];

        assert_eq!(derived_path, &path);
        assert_eq!(private_key.public_key().unwrap(), public_key_at(chain, 3));
    }
}

#[test]
fn test_solana_derivation() {
    let plugin = plugin_for(ChainImpl::Sol);
    let public_key = public_key_at(ChainImpl::Sol, 0);
    assert_eq!(public_key.as_bytes().len(), 32);
    assert_eq!(plugin.account_path(0), "m/44'/501'/0'/0'");

    let address = plugin.address_from_public_key(&public_key).unwrap();
    assert_eq!(plugin.validate_address(&address).unwrap(), address);
    assert_eq!(
        plugin.public_key_from_address(&address),
        Some(public_key.to_hex())
    );
}

#[test]
fn test_algorand_derivation() {
    let plugin = plugin_for(ChainImpl::Algo);
    let public_key = public_key_at(ChainImpl::Algo, 0);
    let address = plugin.address_from_public_key(&public_key).unwrap();

    assert_eq!(address.len(), 58);
    assert_eq!(plugin.account_path(0), "m/44'/283'/0'/0'/0'");
    assert_eq!(plugin.validate_address(&address).unwrap(), address);
    assert_eq!(
        plugin.public_key_from_address(&address),
        Some(public_key.to_hex())
    );
}

#[test]
fn test_derivation_is_deterministic() {
    for chain in ChainImpl::all() {
        assert_eq!(public_key_at(chain, 1), public_key_at(chain, 1));
        assert_ne!(public_key_at(chain, 1), public_key_at(chain, 2));
    }
}

#[test]
fn test_passphrase_changes_seed() {
    let plain = mnemonic_to_seed(MNEMONIC, None).unwrap();
    let salted = mnemonic_to_seed(MNEMONIC, Some("TREZOR")).unwrap();
    assert_ne!(plain.as_slice(), salted.as_slice());

    assert!(validate_mnemonic("abandon abandon abandon").is_err());
}
