impl<DX, APRS, IN, FEEDS> HamClock<DX, APRS, IN, FEEDS>
where
    DX: Transport,
    APRS: Transport,
    IN: TouchInput,
    FEEDS: FeedHandler,
{
    /// Runs one scheduler pass at `now`.
    ///
    /// Fixed order: external screen selection, one touch sample, due poll
    /// triggers, DX link, APRS link, display refresh. A failing step is
    /// logged and never stops the steps after it.
    pub fn tick(&mut self, now: ClockTick, external: Option<ScreenId>) -> PassReport {
        self.last_tick = now;
        let mut report = PassReport::default();

        if let Some(screen) = external
            && self.nav.select(screen)
        {
            info!("nav: external select screen={}", screen.index());
            report.screen_changed = true;
        }

        if self.poll_touch() {
            report.screen_changed = true;
        }

        for task in PollTask::ALL {
            if self.run_poll(task, now) {
                report.polls_triggered += 1;
            }
        }

        let feeds = &mut self.feeds;
        let dx = self
            .dx
            .poll(now, &mut self.dx_transport, |line| feeds.on_line(Peer::DxCluster, line));
        let aprs = self
            .aprs
            .poll(now, &mut self.aprs_transport, |line| feeds.on_line(Peer::AprsIs, line));
        report.lines = dx.lines + aprs.lines;
        report.links_changed = dx.status_changed || aprs.status_changed;
        log_link(&self.dx, dx);
        log_link(&self.aprs, aprs);

        if report.screen_changed || self.timers.display_refresh.is_due(now) {
            self.timers.display_refresh.mark_run(now);
            report.render = TickResult::RenderRequested;
        }

        report
    }

    fn poll_touch(&mut self) -> bool {
        let sample = match self.touch.poll_touch() {
            Ok(sample) => sample,
            Err(_) => {
                if !self.touch_fault_logged {
                    warn!("touch: sample read failed; treating as released");
                    self.touch_fault_logged = true;
                }
                None
            }
        };

        let Some(event) = self.tracker.sample(sample) else {
            return false;
        };

        match self.nav.on_touch(event, self.bounds) {
            Some(screen) => {
                info!("nav: screen={} title={}", screen.index(), screen.title());
                true
            }
            None => false,
        }
    }

    fn run_poll(&mut self, task: PollTask, now: ClockTick) -> bool {
        if !self.timers.poll(task).is_due(now) {
            return false;
        }

        let result = if task == PollTask::Weather && !self.weather_configured {
            Err(FeedError::ConfigMissing)
        } else {
            self.feeds.refresh(task, now)
        };

        match result {
            Ok(()) => debug!("poll: triggered task={}", task.as_str()),
            Err(FeedError::ConfigMissing) => debug!("poll: skipped task={} (unconfigured)", task.as_str()),
            Err(err) => warn!("poll: trigger failed task={} err={:?}", task.as_str(), err),
        }

        self.timers.poll_mut(task).mark_run(now);
        result.is_ok()
    }
}

fn log_link(link: &PeerLink, outcome: LinkPoll) {
    if !outcome.status_changed {
        return;
    }
    match outcome.error {
        Some(err) => debug!(
            "{}: status={} error={} dropped_lines={}",
            link.peer().as_str(),
            link.status().as_str(),
            err.as_str(),
            link.dropped_lines()
        ),
        None => debug!("{}: status={}", link.peer().as_str(), link.status().as_str()),
    }
}
