//! Unit tests for GATT functionality

use super::*;
use crate::channel::{DecodeError, NotificationEvent, WireFormat};
use crate::error::Error;
use crate::gap::PeerId;
use crate::testing::{CentralCall, MockCentralRadio, MockPeripheralRadio, PeripheralCall};
use crate::uuid::Uuid;

const DEMO: ServiceDescriptor = ServiceDescriptor::DEMO;

fn registered_server(radio: &mut MockPeripheralRadio) -> GattServer {
    let mut server = GattServer::new(WireFormat::Compact);
    assert_eq!(server.register_service(DEMO, radio), Ok(true));
    assert_eq!(server.on_service_added(Ok(())), Ok(true));
    server
}

fn notify_characteristic() -> CharacteristicInfo {
    CharacteristicInfo {
        uuid: DEMO.characteristic_uuid,
        properties: CharacteristicProperties::NOTIFY,
    }
}

/// Walks a fresh client through the whole discovery chain.
fn subscribed_client(radio: &mut MockCentralRadio) -> (GattClient, PeerId, SessionId) {
    let mut client = GattClient::new(DEMO, WireFormat::Compact);
    let peer = PeerId::new_random();
    let session = client.connect(peer, radio).unwrap();

    assert_eq!(client.on_connected(&peer, session, radio), LinkOutcome::Connected);
    assert_eq!(
        client.on_services(&peer, session, Ok(vec![DEMO.service_uuid]), radio),
        LinkOutcome::Advanced(SessionState::DiscoveringCharacteristic)
    );
    assert_eq!(
        client.on_characteristics(&peer, session, &DEMO.service_uuid, Ok(vec![notify_characteristic()]), radio),
        LinkOutcome::Advanced(SessionState::Subscribing)
    );
    assert_eq!(
        client.on_notification_state(&peer, session, &DEMO.characteristic_uuid, Ok(true), radio),
        LinkOutcome::Advanced(SessionState::Subscribed)
    );
    (client, peer, session)
}

#[test]
fn test_demo_service_definition() {
    let service = DEMO.service_definition();
    assert!(service.is_primary);
    assert_eq!(service.uuid, Uuid::from_u16(0xABCD));
    assert_eq!(service.characteristics.len(), 1);

    let characteristic = service.characteristic(&Uuid::from_u16(0x1234)).unwrap();
    assert_eq!(characteristic.properties, CharacteristicProperties::NOTIFY);
    assert!(!characteristic.properties.contains(CharacteristicProperties::WRITE));
    assert_eq!(characteristic.permissions, AttributePermissions::READABLE);
    assert_eq!(DEMO.local_name, "MyPeripheral");
}

#[test]
fn test_subscriber_set_is_idempotent() {
    let mut set = SubscriberSet::new();
    let a = SubscriberId::new_random();
    let b = SubscriberId::new_random();

    assert!(set.insert(a));
    assert!(!set.insert(a));
    assert!(set.insert(b));
    assert_eq!(set.len(), 2);

    assert!(set.remove(&a));
    assert!(!set.remove(&a));
    assert!(!set.remove(&SubscriberId::new_random()));
    assert_eq!(set.len(), 1);
    assert!(set.contains(&b));

    assert!(set.remove(&b));
    assert!(!set.remove(&b));
    assert!(set.is_empty());
}

#[test]
fn test_registration_lifecycle() {
    let mut radio = MockPeripheralRadio::new();
    let mut server = GattServer::new(WireFormat::Compact);
    assert_eq!(server.registration(), RegistrationState::Unregistered);

    assert_eq!(server.register_service(DEMO, &mut radio), Ok(true));
    assert_eq!(server.registration(), RegistrationState::Pending);
    assert_eq!(server.register_service(DEMO, &mut radio), Ok(false));
    assert_eq!(radio.count(&PeripheralCall::AddService(DEMO.service_uuid)), 1);

    assert_eq!(server.on_service_added(Ok(())), Ok(true));
    assert!(server.is_registered());
    // Nobody is waiting for a second completion.
    assert_eq!(server.on_service_added(Ok(())), Ok(false));

    let other = ServiceDescriptor::new(Uuid::from_u16(0x180D), Uuid::from_u16(0x2A37), "Other");
    assert_eq!(server.set_descriptor(other), Err(Error::ServiceConflict));
}

#[test]
fn test_registration_failure_allows_retry() {
    let mut radio = MockPeripheralRadio::new();
    let mut server = GattServer::new(WireFormat::Compact);
    server.register_service(DEMO, &mut radio).unwrap();

    assert_eq!(
        server.on_service_added(Err("busy".to_string())),
        Err(Error::Platform("busy".to_string()))
    );
    assert_eq!(server.registration(), RegistrationState::Unregistered);
    assert_eq!(server.register_service(DEMO, &mut radio), Ok(true));
}

#[test]
fn test_publish_reaches_every_subscriber_in_order() {
    let mut radio = MockPeripheralRadio::new();
    let mut server = registered_server(&mut radio);
    let subscribers: Vec<SubscriberId> = (0..3).map(|_| SubscriberId::new_random()).collect();
    for id in &subscribers {
        assert!(server.on_subscribe(*id));
    }

    for _ in 0..5 {
        let report = server.publish(NotificationEvent::ButtonPress, &mut radio).unwrap();
        assert_eq!(report, PublishReport { delivered: 3, failed: 0 });
    }
    server.publish(NotificationEvent::SliderValue(200), &mut radio).unwrap();

    for id in &subscribers {
        let mut expected = vec![vec![0x01]; 5];
        expected.push(vec![200]);
        assert_eq!(radio.notifications_to(id), expected);
    }
    assert_eq!(server.delivered_total(), 18);
}

#[test]
fn test_failed_delivery_does_not_block_others() {
    let mut radio = MockPeripheralRadio::new();
    let mut server = registered_server(&mut radio);
    let lost = SubscriberId::new_random();
    let healthy = SubscriberId::new_random();
    server.on_subscribe(lost);
    server.on_subscribe(healthy);
    radio.unreachable.push(lost);

    let report = server.publish(NotificationEvent::ButtonPress, &mut radio).unwrap();
    assert_eq!(report, PublishReport { delivered: 1, failed: 1 });
    assert_eq!(server.subscriber_count(), 2);
    assert_eq!(radio.notifications_to(&healthy), vec![vec![0x01]]);
    assert_eq!(server.failed_total(), 1);
}

#[test]
fn test_publish_without_subscribers_is_noop() {
    let mut radio = MockPeripheralRadio::new();
    let mut server = registered_server(&mut radio);
    let calls = radio.calls.len();

    let report = server.publish(NotificationEvent::SliderValue(42), &mut radio).unwrap();
    assert_eq!(report, PublishReport::default());
    assert_eq!(radio.calls.len(), calls);
}

#[test]
fn test_publish_rejects_ambiguous_slider() {
    let mut radio = MockPeripheralRadio::new();
    let mut server = registered_server(&mut radio);
    server.on_subscribe(SubscriberId::new_random());

    let result = server.publish(NotificationEvent::SliderValue(1), &mut radio);
    assert!(matches!(result, Err(Error::Encode(_))));
    assert_eq!(server.delivered_total(), 0);
}

#[test]
fn test_reset_drops_subscribers_and_registration() {
    let mut radio = MockPeripheralRadio::new();
    let mut server = registered_server(&mut radio);
    let id = SubscriberId::new_random();
    server.on_subscribe(id);

    assert_eq!(server.reset(), vec![id]);
    assert_eq!(server.subscriber_count(), 0);
    assert_eq!(server.registration(), RegistrationState::Unregistered);
}

#[test]
fn test_discovery_chain_requests() {
    let mut radio = MockCentralRadio::new();
    let (client, peer, session) = subscribed_client(&mut radio);

    assert_eq!(
        radio.calls,
        vec![
            CentralCall::Connect(peer, session),
            CentralCall::DiscoverServices(session),
            CentralCall::DiscoverCharacteristics(session),
            CentralCall::SetNotify(session, true),
        ]
    );
    assert_eq!(client.state(), Some(SessionState::Subscribed));
    assert!(client.observed().connected);
    assert_eq!(client.session().and_then(|s| s.characteristic), Some(DEMO.characteristic_uuid));
}

#[test]
fn test_missing_service_fails_session() {
    let mut radio = MockCentralRadio::new();
    let mut client = GattClient::new(DEMO, WireFormat::Compact);
    let peer = PeerId::new_random();
    let session = client.connect(peer, &mut radio).unwrap();
    client.on_connected(&peer, session, &mut radio);

    let outcome = client.on_services(&peer, session, Ok(vec![Uuid::from_u16(0x180F)]), &mut radio);
    assert_eq!(outcome, LinkOutcome::Failed(Error::DiscoveryFailed(DiscoveryStage::Service)));
    assert_eq!(radio.last(), Some(&CentralCall::Cancel(peer, session)));
    assert_eq!(client.state(), None);
    assert!(!client.observed().connected);
}

#[test]
fn test_characteristic_must_support_notify() {
    let mut radio = MockCentralRadio::new();
    let mut client = GattClient::new(DEMO, WireFormat::Compact);
    let peer = PeerId::new_random();
    let session = client.connect(peer, &mut radio).unwrap();
    client.on_connected(&peer, session, &mut radio);
    client.on_services(&peer, session, Ok(vec![DEMO.service_uuid]), &mut radio);

    let read_only = CharacteristicInfo {
        uuid: DEMO.characteristic_uuid,
        properties: CharacteristicProperties::READ,
    };
    let outcome = client.on_characteristics(&peer, session, &DEMO.service_uuid, Ok(vec![read_only]), &mut radio);
    assert_eq!(
        outcome,
        LinkOutcome::Failed(Error::DiscoveryFailed(DiscoveryStage::Characteristic))
    );
    assert_eq!(client.state(), None);
}

#[test]
fn test_rejected_subscription_fails_session() {
    let mut radio = MockCentralRadio::new();
    let mut client = GattClient::new(DEMO, WireFormat::Compact);
    let peer = PeerId::new_random();
    let session = client.connect(peer, &mut radio).unwrap();
    client.on_connected(&peer, session, &mut radio);
    client.on_services(&peer, session, Ok(vec![DEMO.service_uuid]), &mut radio);
    client.on_characteristics(&peer, session, &DEMO.service_uuid, Ok(vec![notify_characteristic()]), &mut radio);

    let outcome = client.on_notification_state(
        &peer,
        session,
        &DEMO.characteristic_uuid,
        Err("insufficient authorization".to_string()),
        &mut radio,
    );
    assert_eq!(
        outcome,
        LinkOutcome::Failed(Error::DiscoveryFailed(DiscoveryStage::Subscription))
    );
}

#[test]
fn test_notifications_update_observed_state() {
    let mut radio = MockCentralRadio::new();
    let (mut client, peer, session) = subscribed_client(&mut radio);
    let characteristic = DEMO.characteristic_uuid;
    assert_eq!(client.observed().last_slider_value, None);

    assert_eq!(
        client.on_value(&peer, session, &characteristic, &[0x01]),
        LinkOutcome::Received(NotificationEvent::ButtonPress)
    );
    assert!(client.observed().last_button_toggle);
    client.on_value(&peer, session, &characteristic, &[0x01]);
    assert!(!client.observed().last_button_toggle);

    client.on_value(&peer, session, &characteristic, &[200]);
    assert_eq!(client.observed().last_slider_value, Some(200));
}

#[test]
fn test_malformed_payloads_are_dropped_and_counted() {
    let mut radio = MockCentralRadio::new();
    let (mut client, peer, session) = subscribed_client(&mut radio);
    let characteristic = DEMO.characteristic_uuid;
    client.on_value(&peer, session, &characteristic, &[0x10]);
    let before = *client.observed();

    assert_eq!(
        client.on_value(&peer, session, &characteristic, &[0x00]),
        LinkOutcome::Dropped(DecodeError::Reserved(0))
    );
    assert!(matches!(
        client.on_value(&peer, session, &characteristic, &[]),
        LinkOutcome::Dropped(DecodeError::WrongLength { .. })
    ));
    assert!(matches!(
        client.on_value(&peer, session, &characteristic, &[0x01, 0x01]),
        LinkOutcome::Dropped(DecodeError::WrongLength { .. })
    ));

    assert_eq!(*client.observed(), before);
    assert_eq!(client.malformed_payloads(), 3);
}

#[test]
fn test_values_before_subscription_are_ignored() {
    let mut radio = MockCentralRadio::new();
    let mut client = GattClient::new(DEMO, WireFormat::Compact);
    let peer = PeerId::new_random();
    let session = client.connect(peer, &mut radio).unwrap();
    client.on_connected(&peer, session, &mut radio);

    assert_eq!(
        client.on_value(&peer, session, &DEMO.characteristic_uuid, &[0x01]),
        LinkOutcome::Ignored
    );
    assert!(!client.observed().last_button_toggle);
}

#[test]
fn test_superseded_session_callbacks_are_ignored() {
    let mut radio = MockCentralRadio::new();
    let mut client = GattClient::new(DEMO, WireFormat::Compact);
    let first = PeerId::new_random();
    let second = PeerId::new_random();

    let old = client.connect(first, &mut radio).unwrap();
    let new = client.connect(second, &mut radio).unwrap();
    assert!(new > old);
    assert!(radio.calls.contains(&CentralCall::Cancel(first, old)));

    assert_eq!(client.on_connected(&first, old, &mut radio), LinkOutcome::Ignored);
    assert_eq!(client.on_disconnected(&first, old, None), LinkOutcome::Ignored);
    assert_eq!(client.state(), Some(SessionState::Connecting));
    assert_eq!(client.on_connected(&second, new, &mut radio), LinkOutcome::Connected);
}

#[test]
fn test_disconnect_resets_session() {
    let mut radio = MockCentralRadio::new();
    let (mut client, peer, session) = subscribed_client(&mut radio);

    assert_eq!(
        client.on_disconnected(&peer, session, Some("timeout".to_string())),
        LinkOutcome::Closed
    );
    assert_eq!(client.state(), None);
    assert!(!client.observed().connected);
    assert_eq!(
        client.on_value(&peer, session, &DEMO.characteristic_uuid, &[0x01]),
        LinkOutcome::Ignored
    );
}

proptest::proptest! {
    #[test]
    fn prop_subscriber_set_matches_model(ops in proptest::collection::vec((proptest::bool::ANY, 0usize..4), 0..64)) {
        let ids: Vec<SubscriberId> = (0..4).map(|_| SubscriberId::new_random()).collect();
        let mut set = SubscriberSet::new();
        let mut model = std::collections::BTreeSet::new();

        for (insert, index) in ops {
            if insert {
                proptest::prop_assert_eq!(set.insert(ids[index]), model.insert(index));
            } else {
                proptest::prop_assert_eq!(set.remove(&ids[index]), model.remove(&index));
            }
            proptest::prop_assert_eq!(set.len(), model.len());
        }
        for (index, id) in ids.iter().enumerate() {
            proptest::prop_assert_eq!(set.contains(id), model.contains(&index));
        }
    }
}
