impl<DX, APRS, IN, FEEDS> HamClock<DX, APRS, IN, FEEDS>
where
    DX: Transport,
    APRS: Transport,
    IN: TouchInput,
    FEEDS: FeedHandler,
{
    /// Hands the renderer a read-only view of the current screen plus the
    /// feed handler's state.
    pub fn with_screen<R>(&self, now: ClockTick, f: impl FnOnce(ScreenView<'_>, &FEEDS) -> R) -> R {
        let view = ScreenView {
            screen: self.nav.current(),
            uptime_s: now / 1_000,
            dx: self.dx.status(),
            aprs: self.aprs.status(),
            callsign: self.callsign.as_str(),
            locator: self.locator.as_str(),
        };
        f(view, &self.feeds)
    }
}
