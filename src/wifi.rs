use anyhow::{anyhow, Result};
use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
use esp_idf_svc::netif::IpEvent;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{EspWifi, WifiEvent};
use esp_idf_sys as sys;
use log::warn;

use greenhouse_node::config::NodeConfig;
use greenhouse_node::link::{Link, LinkEvent, LinkState};

/// Keeps the driver and its event subscriptions alive for the cycle.
pub struct WifiLink {
    _wifi: EspWifi<'static>,
    _wifi_events: EspSubscription<'static, System>,
    _ip_events: EspSubscription<'static, System>,
}

/// Start the station and feed driver events into `link`. Returns without
/// waiting; callers block on [`Link::await_connected`].
pub fn start(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
    config: &NodeConfig,
    link: Link,
) -> Result<WifiLink> {
    let mut wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs))?;

    let auth_method = if config.wifi_pass.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPA2Personal
    };

    let ssid = config
        .wifi_ssid
        .try_into()
        .map_err(|_| anyhow!("WIFI_SSID too long"))?;
    let password = config
        .wifi_pass
        .try_into()
        .map_err(|_| anyhow!("WIFI_PASS too long"))?;

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid,
        password,
        auth_method,
        ..Default::default()
    }))?;

    let wifi_link = link.clone();
    let wifi_events = sys_loop.subscribe::<WifiEvent, _>(move |event| match event {
        WifiEvent::StaStarted => {
            wifi_link.apply(LinkEvent::Started);
        }
        WifiEvent::StaDisconnected(_) => {
            // Keep retrying association until the cycle gives up on the link,
            // but not while the driver is being torn down.
            if wifi_link.apply(LinkEvent::Lost) == LinkState::Connecting {
                if let Err(err) = sys::esp!(unsafe { sys::esp_wifi_connect() }) {
                    warn!("esp_wifi_connect failed: {err}");
                }
            }
        }
        WifiEvent::StaStopped => {
            wifi_link.apply(LinkEvent::Stopped);
        }
        _ => {}
    })?;

    let ip_link = link;
    let ip_events = sys_loop.subscribe::<IpEvent, _>(move |event| match event {
        IpEvent::DhcpIpAssigned(_) => {
            ip_link.apply(LinkEvent::Associated);
        }
        IpEvent::DhcpIpDeassigned(_) => {
            ip_link.apply(LinkEvent::Lost);
        }
        _ => {}
    })?;

    wifi.start()?;
    wifi.connect()?;

    Ok(WifiLink {
        _wifi: wifi,
        _wifi_events: wifi_events,
        _ip_events: ip_events,
    })
}
