//! Help texts. Command references are rendered with the configured OSC prefix.

pub const USAGE: &str = "
USAGE:
    rcmp [options...] [file]

    The optional file is either a MIDI file or a directory holding
    MIDI files.

    For a directory, every MIDI file in it is added to the media-list
    and the first one is selected.

    For a MIDI file, its parent directory is added to the media-list
    and the file itself is selected for playback.

    With --play, playback of the selected file starts immediately.

    With --exit, rcmp exits as soon as the initial file has finished.
    Otherwise it keeps running and waits for OSC commands; send
    <prefix>/exit to terminate it.

    NOTE: files are played as one chronological event stream, the
    way single-track (type 0) MIDI files are laid out.

    -h --help
            Display auto-generated command-line help and exit.

       --docs
            Display this documentation and exit.

    -l --list
            List available MIDI outputs and exit.

    -i --info
            Print the selected MIDI file and exit.

       --dump
            Print the resolved configuration and media-list as JSON
            and exit.

    -o --out device
            Select the MIDI output, see --list for possible values.
            device is either the position in the list or the exact
            device name (quote names with spaces).  Defaults to 0.
            An unknown device falls back to output 0.

       --port
            OSC port number, default 7000.

       --osc
            OSC path prefix, every command starts with it,
            default '/rcmp'.

       --ip
            OSC server ip address, default 127.0.0.1.

    -p --play
            Start playing the selected file immediately.  Ignored when
            nothing is selected.

    -x --exit
            Exit after the initial file has played to the end.  Only
            useful together with --play.

    -v
            Increase log verbosity (repeatable), RUST_LOG overrides.
";

const OSC_COMMANDS_TEMPLATE: &str = "
OSC COMMANDS:

    {prefix}/exit
        Terminate rcmp.

    {prefix}/play
        Start playback of the selected MIDI file.

    {prefix}/stop
        Stop playback.  Notes left sounding are switched off.

    {prefix}/list
        Display the media-list, an asterisk marks the selected file.

    {prefix}/info
        Display the MIDI output and the selected MIDI file.

    {prefix}/scan directory
        Clear the media-list, then load every MIDI file in directory.

    {prefix}/select file
        Select a file from the media-list, either by its position in
        the list or by name.  Names do not include the extension.

    {prefix}/help
        Display this message.
";

/// OSC command reference for `prefix`
pub fn osc_commands(prefix: &str) -> String {
    OSC_COMMANDS_TEMPLATE.replace("{prefix}", prefix)
}

/// Complete documentation printed by `--docs`
pub fn full_docs(prefix: &str) -> String {
    format!(
        "\nNAME\n    rcmp is a terminal based MIDI file player with OSC control.\n{}{}",
        USAGE,
        osc_commands(prefix)
    )
}
