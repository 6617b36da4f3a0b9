use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use simple_counter_core::{
    DataPointBatch, PollingAdapter, RawAdapterConfig, SimpleCounterAdapter, COUNTER_DATA_POINT,
};
use simple_counter_mqtt::{spawn_event_loop, MqttPublisher, MqttPublisherConfig};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;
use uuid::Uuid;

fn parse_mqtt_url(url: &str) -> (String, u16) {
    let url = url
        .strip_prefix("tcp://")
        .or_else(|| url.strip_prefix("mqtt://"))
        .unwrap_or(url);

    let parts: Vec<&str> = url.split(':').collect();

    let host = parts.first().copied().unwrap_or("localhost").to_string();
    let port = parts.get(1).and_then(|p| p.parse().ok()).unwrap_or(1883);

    (host, port)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn counter_published_over_mqtt() {
    if std::env::var("SIMPLE_COUNTER_INTEGRATION").is_err() {
        eprintln!("Skipping integration test; set SIMPLE_COUNTER_INTEGRATION=1 to run");
        return;
    }

    let broker = std::env::var("SIMPLE_COUNTER_MQTT_BROKER")
        .unwrap_or_else(|_| "tcp://localhost:1883".to_string());
    let (host, port) = parse_mqtt_url(&broker);

    let topic = format!("simple-counter-it/{}/value", Uuid::new_v4());

    let mut sub_opts = MqttOptions::new(format!("sub-{}", Uuid::new_v4()), host, port);
    sub_opts.set_keep_alive(Duration::from_secs(5));
    let (sub_client, mut sub_eventloop) = AsyncClient::new(sub_opts, 10);
    sub_client
        .subscribe(&topic, QoS::AtLeastOnce)
        .await
        .unwrap();

    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        loop {
            match sub_eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let _ = tx.send(publish.payload.to_vec());
                    break;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });

    let publisher_config = MqttPublisherConfig {
        mqtt_broker: broker,
        client_id: format!("pub-{}", Uuid::new_v4()),
        qos: QoS::AtLeastOnce,
        ..Default::default()
    };
    let (publisher, eventloop) = MqttPublisher::new(&publisher_config).unwrap();
    let event_loop_task = spawn_event_loop(eventloop);

    tokio::time::sleep(Duration::from_millis(200)).await;

    let config = RawAdapterConfig {
        initial_counter_value: 41,
        destination_topic: topic,
        ..RawAdapterConfig::new("integration")
    }
    .validate()
    .unwrap();
    let mut adapter = SimpleCounterAdapter::new(config, publisher.clone());

    adapter.start().await.unwrap();
    adapter.poll().await.unwrap();

    let received = timeout(Duration::from_secs(5), rx)
        .await
        .expect("timeout waiting for MQTT message")
        .expect("subscriber dropped");

    let batch: DataPointBatch = serde_json::from_slice(&received).unwrap();
    assert_eq!(batch.adapter_id, "integration");
    assert_eq!(batch.get(COUNTER_DATA_POINT), Some(&serde_json::json!(42)));

    adapter.stop().await.unwrap();
    publisher.disconnect().await.unwrap();
    let _ = timeout(Duration::from_secs(5), event_loop_task).await;
}
