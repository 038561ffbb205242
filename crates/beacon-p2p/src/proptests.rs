#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::communicator::{
        channel_opening_message, mailbox_prefix, parse_channel_opening, recipient_identifier,
    };
    use crate::selector::{replica_nonce, RelaySelector};

    fn pool() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-z0-9.-]{1,24}", 1..8)
    }

    proptest! {
        #[test]
        fn test_selection_is_deterministic(nodes in pool(), key in any::<[u8; 32]>(), replica in 0usize..300) {
            let a = RelaySelector::new(nodes.clone());
            let b = RelaySelector::new(nodes.clone());
            let selected = a.select_for(&key, Some(replica));
            prop_assert_eq!(&selected, &b.select_for(&key, Some(replica)));
            prop_assert!(nodes.contains(&selected));
        }

        #[test]
        fn test_selection_returns_first_minimum(node in "[a-z]{1,12}", key in any::<[u8; 32]>()) {
            // Duplicated nodes are equidistant; the first one must win.
            let selector = RelaySelector::new(vec![node.clone(), node.clone()]);
            prop_assert_eq!(selector.select_for(&key, None), node);
        }

        #[test]
        fn test_replica_nonce_is_even_lowercase_hex(replica in any::<usize>()) {
            let nonce = replica_nonce(replica);
            prop_assert_eq!(nonce.len() % 2, 0);
            prop_assert!(nonce.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
            prop_assert_eq!(usize::from_str_radix(&nonce, 16).unwrap(), replica);
        }

        #[test]
        fn test_recipient_has_mailbox_prefix(key in any::<[u8; 32]>(), node in "[a-z0-9.:-]{1,24}") {
            let recipient = recipient_identifier(&key, &node);
            prop_assert!(recipient.starts_with(&mailbox_prefix(&key)));
            prop_assert!(recipient.ends_with(&node));
        }

        #[test]
        fn test_channel_opening_parses(key in any::<[u8; 32]>(), node in "[a-z0-9.:-]{1,24}", payload in "[0-9a-f]{2,64}") {
            let recipient = recipient_identifier(&key, &node);
            let message = channel_opening_message(&recipient, &payload);
            prop_assert_eq!(parse_channel_opening(&message), Some((recipient.as_str(), payload.as_str())));
        }
    }
}
