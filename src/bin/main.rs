#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use core::cell::RefCell;

use embassy_futures::join::{join, join3, join4};
use embassy_time::Timer;
use embedded_hal_bus::spi::ExclusiveDevice;
use esp_hal::{
    clock::CpuClock,
    delay::Delay,
    gpio::{DriveMode, Input, InputConfig, Level, Output, OutputConfig},
    ledc::{
        LSGlobalClkSource, Ledc, LowSpeed,
        channel::{self as ledc_channel, ChannelIFace as _},
        timer::{self as ledc_timer, TimerIFace as _},
    },
    spi::master::Spi,
    time::{Instant, Rate},
    timer::timg::TimerGroup,
};
use hamclock_core::{
    app::{HamClock, TickResult},
    config::{ConfigStore, HamConfig},
    dhcp::DhcpServer,
    feeds::FeedBoard,
    link::Peer,
    schedule::ClockTick,
    screen::{ScreenBounds, ScreenMailbox},
    status::StatusBoard,
    touch::{TouchCalibration, TouchTracker},
};
use hamclock_hal_esp32::{
    input::xpt2046::Xpt2046,
    network::{
        ConnectivityHandle, SETUP_AP_ADDRESS, SETUP_AP_PREFIX_LEN,
        bridge::{SOCKET_BUFFER_BYTES, SocketBridge, run_socket_pump},
        dhcp_server::run_dhcp_server,
    },
    render::ScreenRenderer,
    storage::flash_config::FlashConfigStore,
};
use ili9341::{Ili9341, Orientation};
use log::{LevelFilter, info, warn};
use static_cell::StaticCell;

use config_api::ApiShared;

#[path = "main/config_api.rs"]
mod config_api;
#[path = "main/wifi.rs"]
mod wifi;

const DISPLAY_SPI_HZ: u32 = 40_000_000;
const TOUCH_SPI_HZ: u32 = 2_000_000;
const SCHEDULER_PASS_MS: u64 = 10;
const BACKLIGHT_PWM_KHZ: u32 = 5;
/// A finger lift only counts after this many untouched samples.
const TOUCH_RELEASE_SAMPLES: u8 = 3;

static CONNECTIVITY: ConnectivityHandle = ConnectivityHandle::new();
static STATUS: StatusBoard = StatusBoard::new();
static SCREEN_MAILBOX: ScreenMailbox = ScreenMailbox::new();
static DX_BRIDGE: SocketBridge = SocketBridge::new();
static APRS_BRIDGE: SocketBridge = SocketBridge::new();
static CONFIG: StaticCell<HamConfig> = StaticCell::new();
static NET_RESOURCES: StaticCell<embassy_net::StackResources<6>> = StaticCell::new();
static AP_NET_RESOURCES: StaticCell<embassy_net::StackResources<3>> = StaticCell::new();
static BACKLIGHT_TIMER: StaticCell<ledc_timer::Timer<'static, LowSpeed>> = StaticCell::new();

#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

fn load_config(store: Option<&mut FlashConfigStore>) -> HamConfig {
    let Some(store) = store else {
        info!("config: storage unavailable; defaults will be volatile");
        return HamConfig::default();
    };

    match store.load() {
        Ok(Some(config)) => {
            info!("config: restored from flash");
            config
        }
        Ok(None) => {
            info!("config: no saved configuration; using defaults");
            HamConfig::default()
        }
        Err(err) => {
            warn!("config: saved record unreadable err={:?}; using defaults", err);
            HamConfig::default()
        }
    }
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    esp_println::logger::init_logger(LevelFilter::Info);
    esp_println::println!("boot: hamclock starting");

    let hal_config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(hal_config);

    // esp-radio and the JSON API both need an allocator.
    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 98_304);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let mut config_store = match FlashConfigStore::new() {
        Ok(store) => Some(store),
        Err(err) => {
            warn!("config: flash store unavailable err={:?}", err);
            None
        }
    };
    let config: &'static HamConfig = CONFIG.init(load_config(config_store.as_mut()));

    // Backlight: LEDC low-speed channel 0 on GPIO21, 8-bit at 5 kHz.
    let mut ledc = Ledc::new(peripherals.LEDC);
    ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);
    let mut backlight_timer = ledc.timer::<LowSpeed>(ledc_timer::Number::Timer0);
    backlight_timer
        .configure(ledc_timer::config::Config {
            duty: ledc_timer::config::Duty::Duty8Bit,
            clock_source: ledc_timer::LSClockSource::APBClk,
            frequency: Rate::from_khz(BACKLIGHT_PWM_KHZ),
        })
        .unwrap();
    let backlight_timer = BACKLIGHT_TIMER.init(backlight_timer);
    let mut backlight =
        ledc.channel::<LowSpeed>(ledc_channel::Number::Channel0, peripherals.GPIO21);
    backlight
        .configure(ledc_channel::config::Config {
            timer: &*backlight_timer,
            duty_pct: config.backlight_duty_pct(),
            drive_mode: DriveMode::PushPull,
        })
        .unwrap();
    info!(
        "backlight: brightness={} duty={}%",
        config.brightness,
        config.backlight_duty_pct()
    );

    // Display wiring: SCK=GPIO14 MOSI=GPIO13 MISO=GPIO12 CS=GPIO15 DC=GPIO2
    let display_spi_config = esp_hal::spi::master::Config::default()
        .with_frequency(Rate::from_hz(DISPLAY_SPI_HZ))
        .with_mode(esp_hal::spi::Mode::_0);
    let display_spi = Spi::new(peripherals.SPI2, display_spi_config)
        .unwrap()
        .with_sck(peripherals.GPIO14)
        .with_mosi(peripherals.GPIO13)
        .with_miso(peripherals.GPIO12);
    let display_cs = Output::new(peripherals.GPIO15, Level::High, OutputConfig::default());
    let display_dc = Output::new(peripherals.GPIO2, Level::Low, OutputConfig::default());
    let display_device = ExclusiveDevice::new(display_spi, display_cs, Delay::new()).unwrap();

    let orientation = Orientation::from_rotation(config.rotation);
    let mut display = Ili9341::new(
        display_device,
        display_dc,
        ili9341::Config {
            spi_hz: DISPLAY_SPI_HZ,
            orientation,
            ..ili9341::Config::default()
        },
    );

    let mut delay = Delay::new();
    let mut display_fault_logged = false;
    esp_println::println!("display: init begin (SCK=14 MOSI=13 CS=15 DC=2 BL=21)");
    if let Err(err) = display.initialize(&mut delay) {
        esp_println::println!("display: initialize failed");
        warn!("display: initialize failed err={:?}", err);
        display_fault_logged = true;
    } else if let Err(err) = display.clear(0x0000) {
        warn!("display: clear failed err={:?}", err);
        display_fault_logged = true;
    } else {
        esp_println::println!("display: initialize ok");
    }
    let (width, height) = display.dimensions();

    // Touch wiring: CLK=GPIO25 MOSI=GPIO32 MISO=GPIO39 CS=GPIO33 IRQ=GPIO36
    let touch_spi_config = esp_hal::spi::master::Config::default()
        .with_frequency(Rate::from_hz(TOUCH_SPI_HZ))
        .with_mode(esp_hal::spi::Mode::_0);
    let touch_spi = Spi::new(peripherals.SPI3, touch_spi_config)
        .unwrap()
        .with_sck(peripherals.GPIO25)
        .with_mosi(peripherals.GPIO32)
        .with_miso(peripherals.GPIO39);
    let touch_cs = Output::new(peripherals.GPIO33, Level::High, OutputConfig::default());
    let touch_device = ExclusiveDevice::new(touch_spi, touch_cs, Delay::new()).unwrap();
    let touch_irq = Input::new(peripherals.GPIO36, InputConfig::default());
    let touch = Xpt2046::new(
        touch_device,
        touch_irq,
        TouchCalibration::default()
            .with_rotation(config.rotation)
            .with_screen(width, height),
    );

    let mut app = HamClock::new(
        DX_BRIDGE.transport(),
        APRS_BRIDGE.transport(),
        touch,
        FeedBoard::new(),
        config,
        ScreenBounds::new(width, height),
    )
    .with_touch_tracker(TouchTracker::new().with_release_samples(TOUCH_RELEASE_SAMPLES));

    let radio = match esp_radio::init() {
        Ok(radio) => radio,
        Err(err) => {
            warn!("wifi: esp-radio init failed err={:?}", err);
            loop {
                Timer::after_secs(1).await;
            }
        }
    };

    let (mut wifi_controller, interfaces) =
        match esp_radio::wifi::new(&radio, peripherals.WIFI, esp_radio::wifi::Config::default()) {
            Ok(parts) => parts,
            Err(err) => {
                warn!("wifi: peripheral init failed err={:?}", err);
                loop {
                    Timer::after_secs(1).await;
                }
            }
        };

    let stack_config = embassy_net::Config::dhcpv4(Default::default());
    let (stack, mut net_runner) = embassy_net::new(
        interfaces.sta,
        stack_config,
        NET_RESOURCES.init(embassy_net::StackResources::<6>::new()),
        0x4843_4B31_7A0E_5D93,
    );

    // Setup access point: fixed address, leases handed out by our DHCP server.
    let ap_config = embassy_net::Config::ipv4_static(embassy_net::StaticConfigV4 {
        address: embassy_net::Ipv4Cidr::new(SETUP_AP_ADDRESS, SETUP_AP_PREFIX_LEN),
        gateway: None,
        dns_servers: Default::default(),
    });
    let (ap_stack, mut ap_net_runner) = embassy_net::new(
        interfaces.ap,
        ap_config,
        AP_NET_RESOURCES.init(embassy_net::StackResources::<3>::new()),
        0x4843_4B31_A9F0_2C41,
    );

    let store = RefCell::new(config_store);
    let api_shared = ApiShared {
        config,
        connectivity: &CONNECTIVITY,
        status: &STATUS,
        mailbox: &SCREEN_MAILBOX,
        store: &store,
    };

    let wifi_candidates = config.wifi_candidates();
    let mut dx_rx = [0u8; SOCKET_BUFFER_BYTES];
    let mut dx_tx = [0u8; SOCKET_BUFFER_BYTES];
    let mut aprs_rx = [0u8; SOCKET_BUFFER_BYTES];
    let mut aprs_tx = [0u8; SOCKET_BUFFER_BYTES];

    info!(
        "hamclock started: callsign={} screen={}x{} rotation={} wifi_candidates={}",
        config.callsign,
        width,
        height,
        config.rotation,
        wifi_candidates.len()
    );

    let net_future = net_runner.run();
    let wifi_future =
        wifi::wifi_connection_loop(&mut wifi_controller, stack, &CONNECTIVITY, &wifi_candidates);
    let dx_pump = run_socket_pump(stack, &DX_BRIDGE, Peer::DxCluster, &mut dx_rx, &mut dx_tx);
    let aprs_pump = run_socket_pump(stack, &APRS_BRIDGE, Peer::AprsIs, &mut aprs_rx, &mut aprs_tx);
    let ap_net_future = ap_net_runner.run();
    let dhcp_future = run_dhcp_server(ap_stack, DhcpServer::new(SETUP_AP_ADDRESS));
    let api_future = config_api::config_api_loop(stack, api_shared, "sta");
    let ap_api_future = config_api::config_api_loop(ap_stack, api_shared, "ap");
    let scheduler_future = async {
        let mut renderer = ScreenRenderer::new();
        let mut last_connectivity_revision = u32::MAX;
        let mut display_first_flush_logged = false;
        let loop_start = Instant::now();

        loop {
            // Wraps after ~49 days; every interval check is wrap-safe.
            let now = loop_start.elapsed().as_millis() as ClockTick;
            let report = app.tick(now, SCREEN_MAILBOX.take());
            app.publish_status(&STATUS);

            let connectivity = CONNECTIVITY.snapshot();
            let connectivity_changed = connectivity.revision != last_connectivity_revision;

            if report.render == TickResult::RenderRequested || connectivity_changed {
                let result = app.with_screen(now, |view, feeds| {
                    renderer.render(view, feeds, connectivity, &mut display)
                });
                match result {
                    Err(err) => {
                        if !display_fault_logged {
                            esp_println::println!("display: render failed");
                            warn!("display: render failed err={:?}", err);
                            display_fault_logged = true;
                        }
                        renderer.invalidate();
                    }
                    Ok(()) if !display_first_flush_logged => {
                        esp_println::println!("display: first frame ok");
                        display_first_flush_logged = true;
                    }
                    Ok(()) => {}
                }
                last_connectivity_revision = connectivity.revision;
            }

            Timer::after_millis(SCHEDULER_PASS_MS).await;
        }
    };

    let _ = join3(
        join4(net_future, ap_net_future, wifi_future, dhcp_future),
        join(dx_pump, aprs_pump),
        join3(api_future, ap_api_future, scheduler_future),
    )
    .await;
    unreachable!()
}
