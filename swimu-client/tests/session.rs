use std::sync::{Arc, Mutex};
use std::time::Duration;

use swimu_client::mock::{MockEvent, MockTransport};
use swimu_client::{
    ConfigPayload, DispatchError, Driver, Mode, Sample, Session, Timeouts, Timestamp,
};
use swimu_proto::ble::{
    ACTIVITY_UUID, CONFIG_FILE_NAME_UUID, CONFIG_SERVICE_UUID, DATETIME_UUID,
    FILE_TX_SERVICE_UUID, IMU_DATA_UUID, IMU_REQUEST_UUID, IMU_SERVICE_UUID, PERSON_NAME_UUID,
};

#[tokio::test]
async fn configuration_through_the_session() {
    let mock = MockTransport::new();
    mock.push_read(CONFIG_FILE_NAME_UUID, b"2024_01_11_19_06_40_ada.bin\0");
    let mut session = Session::new(mock.connection(Timeouts::default()));

    let Driver::Configuration(driver) = session.dispatch(&[CONFIG_SERVICE_UUID]).unwrap() else {
        panic!("expected the configuration driver");
    };
    let payload = ConfigPayload::new("ada", "swim", Timestamp::parse("2024_01_11_19_06_40").unwrap());
    let later = Timestamp::parse("2024_01_11_19_06_42").unwrap();
    driver.configure(&payload, &later).await.unwrap();
    let file = driver.read_configured_file_name().await.unwrap();

    assert_eq!(file, "2024_01_11_19_06_40_ada.bin");
    assert_eq!(
        mock.writes(),
        vec![
            (PERSON_NAME_UUID, b"ada".to_vec()),
            (DATETIME_UUID, b"2024_01_11_19_06_40".to_vec()),
            (ACTIVITY_UUID, b"swim".to_vec()),
            (DATETIME_UUID, b"2024_01_11_19_06_42".to_vec()),
        ]
    );
    assert_eq!(session.state().mode(), Some(Mode::Configuration));
}

#[tokio::test]
async fn config_wins_over_other_services() {
    let mock = MockTransport::new();
    let mut session = Session::new(mock.connection(Timeouts::default()));
    let driver = session
        .dispatch(&[FILE_TX_SERVICE_UUID, IMU_SERVICE_UUID, CONFIG_SERVICE_UUID])
        .unwrap();
    assert_eq!(driver.mode(), Mode::Configuration);
}

#[tokio::test]
async fn streaming_through_the_session() {
    let mock = MockTransport::new();
    mock.on_write(
        IMU_REQUEST_UUID,
        b"START",
        vec![
            (IMU_DATA_UUID, b"0.01,0.1,0.2,9.8,0,0,0".to_vec()),
            (IMU_DATA_UUID, b"0.02,0.1,0.2,9.8,0,0".to_vec()),
            (IMU_DATA_UUID, b"0.03,0.1,0.2,9.8,0,0,1".to_vec()),
        ],
    );
    let mut session = Session::new(mock.connection(Timeouts::default()));
    let Driver::Streaming(driver) = session.dispatch(&[IMU_SERVICE_UUID]).unwrap() else {
        panic!("expected the streaming driver");
    };

    let seen: Arc<Mutex<Vec<Sample>>> = Arc::default();
    let on_sample = {
        let seen = Arc::clone(&seen);
        move |s| seen.lock().unwrap().push(s)
    };
    let settle = mock.clone();
    let stats = driver
        .run_until(on_sample, async move { settle.settle().await })
        .await
        .unwrap();

    assert_eq!((stats.samples, stats.dropped), (2, 1));
    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].elapsed, 0.01);
    assert_eq!(seen[1].gyro, [0.0, 0.0, 1.0]);

    let events: Vec<_> = mock
        .events()
        .into_iter()
        .filter(|e| !matches!(e, MockEvent::Notify(..)))
        .collect();
    assert_eq!(
        events,
        vec![
            MockEvent::Subscribe(IMU_DATA_UUID),
            MockEvent::Write(IMU_REQUEST_UUID, b"START".to_vec()),
            MockEvent::Write(IMU_REQUEST_UUID, b"END".to_vec()),
            MockEvent::Unsubscribe(IMU_DATA_UUID),
        ]
    );
}

#[tokio::test]
async fn second_dispatch_is_refused() {
    let mock = MockTransport::new();
    let mut session = Session::new(mock.connection(Timeouts {
        operation: Duration::from_secs(1),
        transfer: Duration::from_secs(1),
    }));
    session.dispatch(&[IMU_SERVICE_UUID]).unwrap();
    assert_eq!(
        session.dispatch(&[CONFIG_SERVICE_UUID]).err(),
        Some(DispatchError::Finished(Mode::Streaming))
    );
}
