use core::convert::TryInto;
use std::{thread, time::Duration};

use anyhow::{anyhow, Context};
use embedded_svc::{
    http::Method,
    io::Write,
    wifi::{AuthMethod, ClientConfiguration, Configuration},
};
use esp_idf_hal::{
    cpu::Core,
    delay::Ets,
    gpio::{AnyOutputPin, Output, PinDriver},
    task::thread::ThreadSpawnConfiguration,
};
use esp_idf_svc::{
    eventloop::{EspSubscription, EspSystemEventLoop, System},
    hal::{modem::Modem, prelude::Peripherals},
    http::server::{Configuration as HttpConfiguration, EspHttpServer},
    log::EspLogger,
    netif::IpEvent,
    nvs::EspDefaultNvsPartition,
    wifi::{BlockingWifi, EspWifi, WifiEvent},
};
use log::{info, warn};
use serde::Serialize;

use ac_remote_common::{
    config::{HttpConfig, IrHardwareConfig, NetworkConfig},
    IrOutput, RemoteControl, RuntimeConfig,
};

const INDEX_HTML: &str = include_str!("../web/index.html");
const WIFI_CONNECT_ATTEMPTS: u32 = 5;
const WIFI_RETRY_DELAY_MS: u64 = 2_000;

/// IR LED on a plain GPIO, timed with the ROM busy-wait.
struct GpioIrOutput {
    pin: PinDriver<'static, AnyOutputPin, Output>,
}

impl IrOutput for GpioIrOutput {
    fn set_high(&mut self) {
        let _ = self.pin.set_high();
    }

    fn set_low(&mut self) {
        let _ = self.pin.set_low();
    }

    fn delay_us(&mut self, us: u32) {
        Ets::delay_us(us);
    }
}

/// Keeps the Wi-Fi status log subscriptions alive.
struct WifiEventLog {
    _wifi: EspSubscription<'static, System>,
    _ip: EspSubscription<'static, System>,
}

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let mut runtime = RuntimeConfig::default();
    ensure_wifi_defaults(&mut runtime);
    runtime.ir.sanitize();
    runtime.ir.validate().context("invalid IR configuration")?;

    let output = init_ir_output(runtime.ir.tx_pin)?;
    let remote = RemoteControl::new(runtime.ir.timing());
    spawn_transmit_task(&remote, output, &runtime.ir)?;

    let Peripherals { modem, .. } = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    let _events = subscribe_wifi_events(&sys_loop)?;
    let wifi = connect_wifi(modem, sys_loop, nvs_partition, &runtime.network)
        .context("wifi startup failed")?;

    let server = create_http_server(remote, &runtime.http)?;
    info!("HTTP server ready, GET /toggle to switch the AC");

    // Keep services alive for the program lifetime.
    let _wifi = wifi;
    let _server = server;

    loop {
        thread::sleep(Duration::from_secs(60));
    }
}

fn ensure_wifi_defaults(runtime: &mut RuntimeConfig) {
    if runtime.network.wifi_ssid.is_empty() {
        if let Some(ssid) = option_env!("WIFI_SSID") {
            runtime.network.wifi_ssid = ssid.to_string();
        }
    }

    if runtime.network.wifi_pass.is_empty() {
        if let Some(pass) = option_env!("WIFI_PASS") {
            runtime.network.wifi_pass = pass.to_string();
        }
    }
}

fn init_ir_output(pin: i32) -> anyhow::Result<GpioIrOutput> {
    let mut driver = unsafe { PinDriver::output(AnyOutputPin::new(pin)) }
        .with_context(|| format!("failed to configure IR LED on GPIO{pin}"))?;
    let _ = driver.set_low();
    Ok(GpioIrOutput { pin: driver })
}

fn transmit_core(index: u8) -> Core {
    match index {
        #[cfg(any(esp32, esp32s3))]
        1 => Core::Core1,
        _ => Core::Core0,
    }
}

/// Starts the IR thread on its own core at high priority, so the busy-wait
/// loops never share a core with Wi-Fi or the HTTP server.
fn spawn_transmit_task(
    remote: &RemoteControl,
    output: GpioIrOutput,
    ir: &IrHardwareConfig,
) -> anyhow::Result<()> {
    let core = transmit_core(ir.transmit_core);

    ThreadSpawnConfiguration {
        name: Some(b"ir-tx\0"),
        stack_size: ir.transmit_stack_size,
        priority: ir.transmit_priority,
        pin_to_core: Some(core),
        ..Default::default()
    }
    .set()
    .context("failed to configure IR transmit thread")?;

    let task = remote.transmit_task(output);
    let spawned = thread::Builder::new()
        .name("ir-tx".into())
        .stack_size(ir.transmit_stack_size)
        .spawn(move || {
            task.run();
        });

    // Threads spawned later (HTTP, Wi-Fi helpers) must not inherit the pinning.
    ThreadSpawnConfiguration::default()
        .set()
        .context("failed to reset thread spawn configuration")?;
    spawned.context("failed to spawn IR transmit thread")?;

    info!(
        "IR transmitter on GPIO{} pinned to {:?} at priority {}",
        ir.tx_pin, core, ir.transmit_priority
    );
    Ok(())
}

fn subscribe_wifi_events(sys_loop: &EspSystemEventLoop) -> anyhow::Result<WifiEventLog> {
    let wifi = sys_loop.subscribe::<WifiEvent, _>(|event| {
        info!("wifi status: {event:?}");
    })?;
    let ip = sys_loop.subscribe::<IpEvent, _>(|event| {
        info!("ip status: {event:?}");
    })?;

    Ok(WifiEventLog {
        _wifi: wifi,
        _ip: ip,
    })
}

fn connect_wifi(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs_partition: EspDefaultNvsPartition,
    network: &NetworkConfig,
) -> anyhow::Result<EspWifi<'static>> {
    if network.wifi_ssid.trim().is_empty() {
        return Err(anyhow!(
            "wifi credentials missing; build with WIFI_SSID and WIFI_PASS set"
        ));
    }

    let mut esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs_partition))?;
    let mut wifi = BlockingWifi::wrap(&mut esp_wifi, sys_loop)?;

    let auth_method = if network.wifi_pass.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPAWPA2Personal
    };

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: network
            .wifi_ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi ssid too long"))?,
        password: network
            .wifi_pass
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi password too long"))?,
        auth_method,
        ..Default::default()
    }))?;

    wifi.start()?;
    info!("wifi started, connecting to `{}`", network.wifi_ssid);

    let mut last_err = None;
    for attempt in 1..=WIFI_CONNECT_ATTEMPTS {
        match wifi.connect().and_then(|()| wifi.wait_netif_up()) {
            Ok(()) => {
                info!("wifi connected and netif up on attempt {attempt}");
                last_err = None;
                break;
            }
            Err(err) => {
                warn!("wifi connect attempt {attempt}/{WIFI_CONNECT_ATTEMPTS} failed: {err:#}");
                last_err = Some(err);
            }
        }

        if attempt < WIFI_CONNECT_ATTEMPTS {
            let _ = wifi.disconnect();
            thread::sleep(Duration::from_millis(WIFI_RETRY_DELAY_MS));
        }
    }

    if let Some(err) = last_err {
        return Err(err).context(format!(
            "all {WIFI_CONNECT_ATTEMPTS} wifi connect attempts failed"
        ));
    }

    if let Ok(ip_info) = wifi.wifi().sta_netif().get_ip_info() {
        info!("wifi got IP {}", ip_info.ip);
    }

    drop(wifi);
    Ok(esp_wifi)
}

fn create_http_server(
    remote: RemoteControl,
    http: &HttpConfig,
) -> anyhow::Result<EspHttpServer<'static>> {
    let conf = HttpConfiguration {
        stack_size: http.stack_size,
        ..Default::default()
    };

    let mut server = EspHttpServer::new(&conf)?;

    server.fn_handler::<anyhow::Error, _>("/", Method::Get, move |req| {
        req.into_ok_response()?.write_all(INDEX_HTML.as_bytes())?;
        Ok(())
    })?;

    {
        let remote = remote.clone();
        server.fn_handler::<anyhow::Error, _>("/toggle", Method::Get, move |req| {
            let state = remote.on_toggle();
            req.into_response(
                200,
                Some("OK"),
                &[("Content-Type", "text/plain; charset=utf-8")],
            )?
            .write_all(state.as_str().as_bytes())?;
            Ok(())
        })?;
    }

    server.fn_handler("/api/ir/diagnostics", Method::Get, move |req| {
        write_json(req, &remote.diagnostics())
    })?;

    Ok(server)
}

fn write_json<T: Serialize>(
    req: esp_idf_svc::http::server::Request<
        &mut esp_idf_svc::http::server::EspHttpConnection<'_>,
    >,
    payload: &T,
) -> anyhow::Result<()> {
    let body = serde_json::to_vec(payload)?;
    req.into_response(
        200,
        Some("OK"),
        &[("Content-Type", "application/json; charset=utf-8")],
    )?
    .write_all(&body)?;
    Ok(())
}
